//! Offline tabular-file profiling (§4.8, "Offline mode"): no interpreter
//! required, grounded on `dasa.profile.offline.profile_file` reading a
//! delimited file with `csv` the way the dependency's own ingestion paths
//! do (adapted from dashflow-dTOOL's delimited-file readers).

use crate::error::DasaError;
use crate::profile::types::{ColumnProfile, NumericStats, TableProfile};
use std::path::Path;

fn is_integer(value: &str) -> bool {
    !value.contains('.') && value.parse::<i64>().is_ok()
}

fn is_numeric(value: &str) -> bool {
    value.parse::<f64>().is_ok()
}

struct ColumnAccumulator {
    name: String,
    values: Vec<String>,
}

pub fn profile_file(path: &Path) -> Result<TableProfile, DasaError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| DasaError::parse_failure(format!("could not read {}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DasaError::parse_failure(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut columns: Vec<ColumnAccumulator> = headers
        .iter()
        .map(|h| ColumnAccumulator {
            name: h.clone(),
            values: Vec::new(),
        })
        .collect();

    let mut rows = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| DasaError::parse_failure(e.to_string()))?;
        rows += 1;
        for (i, field) in record.iter().enumerate() {
            if let Some(col) = columns.get_mut(i) {
                col.values.push(field.to_string());
            }
        }
    }

    let cols = columns.len();
    let mut profile = TableProfile {
        name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        rows,
        cols,
        memory_bytes: rows * cols * 8,
        columns: columns.into_iter().map(|c| profile_column(c, rows)).collect(),
        global_issues: Vec::new(),
    };
    profile.finalize();
    Ok(profile)
}

fn profile_column(col: ColumnAccumulator, n_total: usize) -> ColumnProfile {
    let non_null: Vec<&String> = col.values.iter().filter(|v| !v.is_empty()).collect();
    let n_non_null = non_null.len();
    let all_numeric = n_non_null > 0 && non_null.iter().all(|v| is_numeric(v));
    let declared_type = if all_numeric {
        if non_null.iter().all(|v| is_integer(v)) {
            "int".to_string()
        } else {
            "float".to_string()
        }
    } else {
        "object".to_string()
    };

    let mut unique: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    for v in &non_null {
        unique.insert(v.as_str());
    }

    let numeric = if all_numeric {
        let nums: Vec<f64> = non_null.iter().filter_map(|v| v.parse::<f64>().ok()).collect();
        Some(numeric_stats(&nums))
    } else {
        None
    };

    let top_values = if all_numeric {
        Vec::new()
    } else {
        let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for v in &non_null {
            *counts.entry(v.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.into_iter().take(10).map(|(v, _)| v.to_string()).collect()
    };

    ColumnProfile {
        name: col.name,
        declared_type,
        n_non_null,
        n_total,
        n_unique: unique.len(),
        nulls_fraction: if n_total == 0 {
            0.0
        } else {
            (n_total - n_non_null) as f64 / n_total as f64
        },
        numeric,
        top_values,
        issues: Vec::new(),
    }
}

fn numeric_stats(values: &[f64]) -> NumericStats {
    if values.is_empty() {
        return NumericStats::default();
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    NumericStats {
        min,
        max,
        mean,
        std: variance.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn profiles_numeric_and_categorical_columns() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp, "t.csv", "revenue,region\n10,east\n-5,west\n,east\n");
        let profile = profile_file(&path).unwrap();
        assert_eq!(profile.rows, 3);
        assert_eq!(profile.cols, 2);
        let revenue = profile.columns.iter().find(|c| c.name == "revenue").unwrap();
        assert_eq!(revenue.declared_type, "int");
        assert!(revenue.issues.iter().any(|i| i.contains("negative")));
        let region = profile.columns.iter().find(|c| c.name == "region").unwrap();
        assert_eq!(region.declared_type, "object");
        assert!(region.top_values.contains(&"east".to_string()));
    }

    #[test]
    fn nulls_fraction_is_tracked() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp, "t.csv", "x\n1\n\n3\n");
        let profile = profile_file(&path).unwrap();
        let x = profile.columns.iter().find(|c| c.name == "x").unwrap();
        assert!((x.nulls_fraction - 1.0 / 3.0).abs() < 1e-9);
        assert!(x.issues.iter().any(|i| i.contains("null")));
    }
}
