//! Decision log (§4.9): append-only, one line per entry, never truncated by
//! the core.

use crate::error::DasaError;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct DecisionLog {
    path: PathBuf,
}

impl DecisionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, source: &str, message: &str) -> Result<(), DasaError> {
        let line = format!("{} [{source}] {message}\n", Utc::now().to_rfc3339());
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Returns the last `n` lines, or all lines if the file has fewer.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }
}

pub fn path_for(metadata_dir: &Path) -> PathBuf {
    metadata_dir.join("log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_tail_is_empty() {
        let tmp = TempDir::new().unwrap();
        let log = DecisionLog::new(tmp.path().join("log"));
        assert!(log.tail(5).is_empty());
    }

    #[test]
    fn append_then_tail_respects_order_and_limit() {
        let tmp = TempDir::new().unwrap();
        let log = DecisionLog::new(tmp.path().join("log"));
        log.append("run", "executed cell 0").unwrap();
        log.append("run", "executed cell 1").unwrap();
        log.append("check", "state is consistent").unwrap();
        let tail = log.tail(2);
        assert_eq!(tail.len(), 2);
        assert!(tail[0].contains("executed cell 1"));
        assert!(tail[1].contains("state is consistent"));
    }
}
