//! Project Context store (§4.9): atomic YAML persistence of
//! `ProjectContext`, tolerant of absence and corruption.

use crate::atomic::{read_to_string_opt, write_atomic};
use crate::error::DasaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Approach {
    pub name: String,
    pub status: ApproachStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApproachStatus {
    #[default]
    Current,
    Abandoned,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approaches: Vec<Approach>,
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub data_refs: std::collections::BTreeMap<String, String>,
}

pub struct ContextStore {
    path: PathBuf,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> ProjectContext {
        match read_to_string_opt(&self.path) {
            Ok(Some(content)) => serde_yml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %self.path.display(), "project context corrupted, treating as empty");
                ProjectContext::default()
            }),
            Ok(None) => ProjectContext::default(),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "project context unreadable, treating as empty");
                ProjectContext::default()
            }
        }
    }

    pub fn write(&self, context: &ProjectContext) -> Result<(), DasaError> {
        let yaml = serde_yml::to_string(context)?;
        write_atomic(&self.path, yaml.as_bytes())
    }
}

pub fn path_for(metadata_dir: &Path) -> PathBuf {
    metadata_dir.join("context")
}
