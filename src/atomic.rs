//! Shared atomic-write utility backing every persistence writer (§5).
//!
//! Writes go to a temporary sibling file, then a rename. The temporary file
//! is removed on any failure path so a crashed write never leaves partial
//! content under the destination name.

use crate::error::DasaError;
use std::path::Path;

/// Write `contents` to `path` atomically.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), DasaError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    use std::io::Write;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| DasaError::corruption(e.to_string()))?;
    Ok(())
}

/// Read `path` to a string, returning `None` if it does not exist.
pub fn read_to_string_opt(path: &Path) -> Result<Option<String>, DasaError> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
