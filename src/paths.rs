//! Canonical path keying and metadata-directory resolution.

use crate::error::DasaError;
use std::path::{Path, PathBuf};

/// Name of the per-project metadata directory, analogous to `.git`.
pub const METADATA_DIR_NAME: &str = ".dasa";

/// Canonicalize a path for use as a stable map key (journal, job bindings).
///
/// Falls back to a lexical absolute path when the file does not yet exist,
/// since `fs::canonicalize` requires the path to exist.
pub fn canonical_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(path)
        }
    })
}

/// Resolve the metadata directory root for a project, given its working
/// directory. Does not create it.
pub fn metadata_dir(project_root: &Path) -> PathBuf {
    project_root.join(METADATA_DIR_NAME)
}

/// Derive the per-notebook metadata scope: `<metadata_dir>/notebooks/<stem>/`.
pub fn notebook_scope_dir(metadata_dir: &Path, notebook_path: &Path) -> PathBuf {
    let stem = notebook_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "notebook".to_string());
    metadata_dir.join("notebooks").join(stem)
}

/// Ensure the metadata directory (and its `profiles/` and `jobs/` children)
/// exists, creating it and touching the decision log if necessary.
pub fn ensure_session(dir: &Path) -> Result<(), DasaError> {
    std::fs::create_dir_all(dir)?;
    std::fs::create_dir_all(dir.join("profiles"))?;
    std::fs::create_dir_all(dir.join("jobs"))?;
    let log_path = dir.join("log");
    if !log_path.exists() {
        std::fs::write(&log_path, b"")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ensure_session_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let dir = metadata_dir(tmp.path());
        ensure_session(&dir).unwrap();
        assert!(dir.join("profiles").is_dir());
        assert!(dir.join("jobs").is_dir());
        assert!(dir.join("log").is_file());
    }

    #[test]
    fn notebook_scope_uses_file_stem() {
        let scope = notebook_scope_dir(Path::new("/proj/.dasa"), Path::new("/proj/analysis.ipynb"));
        assert_eq!(scope, PathBuf::from("/proj/.dasa/notebooks/analysis"));
    }

    #[test]
    fn canonical_key_is_stable_for_existing_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("nb.ipynb");
        std::fs::write(&file, b"{}").unwrap();
        let a = canonical_key(&file);
        let b = canonical_key(&file);
        assert_eq!(a, b);
        assert!(a.is_absolute());
    }
}
