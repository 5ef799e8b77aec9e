//! Job Registry (§4.10): records background executions, one JSON file per
//! job, liveness checked by signalling the stored OS process id.
//!
//! Grounded on `dasa.jobs.registry.JobRegistry`.

use crate::atomic::write_atomic;
use crate::error::DasaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub notebook: String,
    pub cell: usize,
    pub os_process_id: u32,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct JobRegistry {
    dir: PathBuf,
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}

impl JobRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn create(&self, notebook: &str, cell: usize, os_process_id: u32) -> Result<Job, DasaError> {
        std::fs::create_dir_all(&self.dir)?;
        let job = Job {
            id: short_id(),
            notebook: notebook.to_string(),
            cell,
            os_process_id,
            status: JobStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        };
        self.save(&job)?;
        Ok(job)
    }

    fn save(&self, job: &Job) -> Result<(), DasaError> {
        let json = serde_json::to_string_pretty(job)?;
        write_atomic(&self.file_for(&job.id), json.as_bytes())
    }

    /// Reads a job, promoting a stale "running" entry to "failed" if its
    /// process is no longer alive.
    pub fn get(&self, id: &str) -> Result<Job, DasaError> {
        let content = std::fs::read_to_string(self.file_for(id))?;
        let mut job: Job = serde_json::from_str(&content)?;
        if job.status == JobStatus::Running && !is_process_alive(job.os_process_id) {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            job.error = Some("process is no longer running".to_string());
            self.save(&job)?;
        }
        Ok(job)
    }

    pub fn update(
        &self,
        id: &str,
        status: JobStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> Result<Job, DasaError> {
        let mut job = self.get(id)?;
        job.status = status;
        job.result = result;
        job.error = error;
        if status != JobStatus::Running {
            job.completed_at = Some(Utc::now());
        }
        self.save(&job)?;
        Ok(job)
    }

    pub fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut jobs = Vec::new();
        for entry in entries.flatten() {
            let Some(stem) = entry.path().file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if let Ok(job) = self.get(&stem) {
                if status.map_or(true, |s| s == job.status) {
                    jobs.push(job);
                }
            }
        }
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        jobs
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.get(id).map(|j| j.status == JobStatus::Running).unwrap_or(false)
    }
}

pub fn dir_for(metadata_dir: &Path) -> PathBuf {
    metadata_dir.join("jobs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_then_get_round_trips() {
        let tmp = TempDir::new().unwrap();
        let registry = JobRegistry::new(tmp.path());
        let job = registry.create("nb.ipynb", 2, std::process::id()).unwrap();
        let loaded = registry.get(&job.id).unwrap();
        assert_eq!(loaded.status, JobStatus::Running);
        assert_eq!(loaded.cell, 2);
    }

    #[test]
    fn dead_process_is_promoted_to_failed_on_read() {
        let tmp = TempDir::new().unwrap();
        let registry = JobRegistry::new(tmp.path());
        // A PID vanishingly unlikely to be alive in this sandbox.
        let job = registry.create("nb.ipynb", 0, 999_999).unwrap();
        let loaded = registry.get(&job.id).unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
    }

    #[test]
    fn list_filters_by_status() {
        let tmp = TempDir::new().unwrap();
        let registry = JobRegistry::new(tmp.path());
        registry.create("a.ipynb", 0, std::process::id()).unwrap();
        let completed = registry.create("b.ipynb", 0, std::process::id()).unwrap();
        registry
            .update(&completed.id, JobStatus::Completed, Some("ok".to_string()), None)
            .unwrap();
        let running = registry.list(Some(JobStatus::Running));
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].notebook, "a.ipynb");
    }
}
