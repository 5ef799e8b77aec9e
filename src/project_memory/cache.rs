//! Profile cache (§4.9): one YAML file per cached `TableProfile`, keyed by
//! variable name, tolerant of corruption.

use crate::atomic::{read_to_string_opt, write_atomic};
use crate::error::DasaError;
use crate::profile::TableProfile;
use std::path::{Path, PathBuf};

pub struct ProfileCache {
    dir: PathBuf,
}

impl ProfileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, variable: &str) -> PathBuf {
        self.dir.join(format!("{variable}.yaml"))
    }

    pub fn store(&self, profile: &TableProfile) -> Result<(), DasaError> {
        std::fs::create_dir_all(&self.dir)?;
        let yaml = serde_yml::to_string(profile)?;
        write_atomic(&self.file_for(&profile.name), yaml.as_bytes())
    }

    pub fn load(&self, variable: &str) -> Option<TableProfile> {
        let content = read_to_string_opt(&self.file_for(variable)).ok().flatten()?;
        serde_yml::from_str(&content)
            .map_err(|e| {
                tracing::warn!(error = %e, variable, "cached profile corrupted, treating as absent");
            })
            .ok()
    }

    /// Candidate-name to column-list map, the shape Error Enrichment
    /// consults before falling back to a live probe (§4.6).
    pub fn column_index(&self) -> std::collections::BTreeMap<String, Vec<String>> {
        let mut index = std::collections::BTreeMap::new();
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return index;
        };
        for entry in entries.flatten() {
            let Some(stem) = entry.path().file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if let Some(profile) = self.load(&stem) {
                index.insert(stem, profile.columns.into_iter().map(|c| c.name).collect());
            }
        }
        index
    }
}

pub fn dir_for(metadata_dir: &Path) -> PathBuf {
    metadata_dir.join("profiles")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ColumnProfile;
    use tempfile::TempDir;

    fn sample(name: &str) -> TableProfile {
        TableProfile {
            name: name.to_string(),
            rows: 1,
            cols: 1,
            memory_bytes: 8,
            columns: vec![ColumnProfile {
                name: "revenue".to_string(),
                declared_type: "int".to_string(),
                n_non_null: 1,
                n_total: 1,
                n_unique: 1,
                nulls_fraction: 0.0,
                numeric: None,
                top_values: Vec::new(),
                issues: Vec::new(),
            }],
            global_issues: Vec::new(),
        }
    }

    #[test]
    fn store_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let cache = ProfileCache::new(tmp.path());
        cache.store(&sample("df")).unwrap();
        let loaded = cache.load("df").unwrap();
        assert_eq!(loaded.columns[0].name, "revenue");
    }

    #[test]
    fn missing_variable_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let cache = ProfileCache::new(tmp.path());
        assert!(cache.load("nope").is_none());
    }

    #[test]
    fn column_index_aggregates_all_cached_profiles() {
        let tmp = TempDir::new().unwrap();
        let cache = ProfileCache::new(tmp.path());
        cache.store(&sample("df")).unwrap();
        let index = cache.column_index();
        assert_eq!(index.get("df"), Some(&vec!["revenue".to_string()]));
    }
}
