//! Execution Journal (§4.7): the toolkit's own side-channel record of what it
//! executed, independent of the notebook host's `execution_count`.
//!
//! Grounded on `dasa.session.state.StateTracker`: canonicalized-path-keyed
//! JSON, sha256-truncated code hashes, atomic writes, corruption tolerance.

use crate::atomic::{read_to_string_opt, write_atomic};
use crate::error::DasaError;
use crate::paths::canonical_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub code_hash: String,
    pub last_run: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NotebookEntries {
    cells: HashMap<String, JournalEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JournalFile {
    #[serde(flatten)]
    notebooks: HashMap<String, NotebookEntries>,
}

/// Persistent Execution Journal, backed by a single `state.json` file.
pub struct ExecutionJournal {
    path: PathBuf,
}

fn hash_source(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let hex = format!("{digest:x}");
    hex[..12].to_string()
}

impl ExecutionJournal {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self { path: state_file.into() }
    }

    fn load(&self) -> JournalFile {
        match read_to_string_opt(&self.path) {
            Ok(Some(content)) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %self.path.display(), "journal corrupted, treating as empty");
                JournalFile::default()
            }),
            Ok(None) => JournalFile::default(),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "journal unreadable, treating as empty");
                JournalFile::default()
            }
        }
    }

    fn save(&self, file: &JournalFile) -> Result<(), DasaError> {
        let json = serde_json::to_string_pretty(file)?;
        write_atomic(&self.path, json.as_bytes())
    }

    fn key_for(&self, notebook_path: &Path) -> String {
        canonical_key(notebook_path).to_string_lossy().into_owned()
    }

    pub fn update(&self, notebook_path: &Path, index: usize, source: &str) -> Result<(), DasaError> {
        let mut file = self.load();
        let key = self.key_for(notebook_path);
        let entry = file.notebooks.entry(key).or_default();
        entry.cells.insert(
            index.to_string(),
            JournalEntry {
                code_hash: hash_source(source),
                last_run: Utc::now(),
            },
        );
        self.save(&file)
    }

    pub fn is_stale(&self, notebook_path: &Path, index: usize, source: &str) -> bool {
        let file = self.load();
        let key = self.key_for(notebook_path);
        match file.notebooks.get(&key).and_then(|nb| nb.cells.get(&index.to_string())) {
            Some(entry) => entry.code_hash != hash_source(source),
            None => true,
        }
    }

    pub fn was_executed(&self, notebook_path: &Path, index: usize) -> bool {
        let file = self.load();
        let key = self.key_for(notebook_path);
        file.notebooks
            .get(&key)
            .map(|nb| nb.cells.contains_key(&index.to_string()))
            .unwrap_or(false)
    }

    pub fn was_executed_current(&self, notebook_path: &Path, index: usize, source: &str) -> bool {
        self.was_executed(notebook_path, index) && !self.is_stale(notebook_path, index, source)
    }

    pub fn stale_cells(&self, notebook_path: &Path, sources: &[&str]) -> Vec<usize> {
        sources
            .iter()
            .enumerate()
            .filter(|(i, s)| self.is_stale(notebook_path, *i, s))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn journal(tmp: &TempDir) -> ExecutionJournal {
        ExecutionJournal::new(tmp.path().join("state.json"))
    }

    #[test]
    fn never_run_cell_is_stale_and_not_executed() {
        let tmp = TempDir::new().unwrap();
        let j = journal(&tmp);
        let nb = tmp.path().join("nb.ipynb");
        assert!(j.is_stale(&nb, 0, "x = 1"));
        assert!(!j.was_executed(&nb, 0));
    }

    #[test]
    fn update_then_matching_source_is_not_stale() {
        let tmp = TempDir::new().unwrap();
        let j = journal(&tmp);
        let nb = tmp.path().join("nb.ipynb");
        std::fs::write(&nb, b"{}").unwrap();
        j.update(&nb, 0, "x = 1").unwrap();
        assert!(j.was_executed(&nb, 0));
        assert!(!j.is_stale(&nb, 0, "x = 1"));
        assert!(j.was_executed_current(&nb, 0, "x = 1"));
    }

    #[test]
    fn changed_source_is_stale() {
        let tmp = TempDir::new().unwrap();
        let j = journal(&tmp);
        let nb = tmp.path().join("nb.ipynb");
        std::fs::write(&nb, b"{}").unwrap();
        j.update(&nb, 0, "x = 1").unwrap();
        assert!(j.is_stale(&nb, 0, "x = 2"));
        assert!(!j.was_executed_current(&nb, 0, "x = 2"));
    }

    #[test]
    fn corrupted_file_is_tolerated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();
        let j = ExecutionJournal::new(path);
        let nb = tmp.path().join("nb.ipynb");
        assert!(!j.was_executed(&nb, 0));
    }

    #[test]
    fn different_notebooks_are_independent() {
        let tmp = TempDir::new().unwrap();
        let j = journal(&tmp);
        let nb1 = tmp.path().join("a.ipynb");
        let nb2 = tmp.path().join("b.ipynb");
        std::fs::write(&nb1, b"{}").unwrap();
        std::fs::write(&nb2, b"{}").unwrap();
        j.update(&nb1, 0, "x = 1").unwrap();
        assert!(j.was_executed(&nb1, 0));
        assert!(!j.was_executed(&nb2, 0));
    }
}
