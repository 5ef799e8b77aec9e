//! Shared data model for the Profile Engine (§3, §4.8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub declared_type: String,
    pub n_non_null: usize,
    pub n_total: usize,
    pub n_unique: usize,
    pub nulls_fraction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl ColumnProfile {
    pub fn finalize_issues(&mut self) {
        if self.nulls_fraction > 0.0 {
            let pct = self.nulls_fraction * 100.0;
            self.issues.push(format!("{pct:.1}% null values"));
        }
        if let Some(stats) = &self.numeric {
            if stats.min < 0.0 {
                self.issues.push("has negative values".to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableProfile {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub memory_bytes: usize,
    pub columns: Vec<ColumnProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_issues: Vec<String>,
}

impl TableProfile {
    pub fn finalize(&mut self) {
        for column in &mut self.columns {
            column.finalize_issues();
        }
        self.global_issues = self
            .columns
            .iter()
            .filter(|c| !c.issues.is_empty())
            .map(|c| format!("{}: {}", c.name, c.issues.join(", ")))
            .collect();
    }
}
