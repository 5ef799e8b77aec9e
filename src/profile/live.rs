//! Live profiling (§4.8): profiles a named variable inside a running
//! Interpreter Session by injecting a small probe expression and parsing
//! its JSON result, grounded on `dasa.profile.live.profile_variable`.

use crate::error::DasaError;
use crate::interpreter::InterpreterSession;
use crate::profile::types::{ColumnProfile, NumericStats, TableProfile};
use serde::Deserialize;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RawNumericStats {
    min: f64,
    max: f64,
    mean: f64,
    std: f64,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    name: String,
    declared_type: String,
    n_non_null: usize,
    n_total: usize,
    n_unique: usize,
    nulls_fraction: f64,
    numeric: Option<RawNumericStats>,
    #[serde(default)]
    top_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    rows: usize,
    cols: usize,
    memory_bytes: usize,
    columns: Vec<RawColumn>,
}

/// Builds a self-contained pandas-based probe (no pre-injected helpers):
/// it defines a local function, calls it, and leaves the JSON string as the
/// last bare expression so the kernel's auto-display populates
/// `display_value`, same convention `enrichment.rs`'s probes use.
fn probe_source(variable: &str) -> String {
    format!(
        r#"import json as _dasa_json

def _dasa_profile_probe(_df):
    _cols = []
    for _col in _df.columns:
        _s = _df[_col]
        _n_total = int(len(_s))
        _n_non_null = int(_s.count())
        _numeric = None
        _top_values = []
        if _s.dtype.kind in "iuf":
            _numeric = {{
                "min": float(_s.min()) if _n_non_null else 0.0,
                "max": float(_s.max()) if _n_non_null else 0.0,
                "mean": float(_s.mean()) if _n_non_null else 0.0,
                "std": float(_s.std()) if _n_non_null > 1 else 0.0,
            }}
        else:
            _top_values = [str(_v) for _v in _s.value_counts().head(10).index]
        _cols.append({{
            "name": str(_col),
            "declared_type": str(_s.dtype),
            "n_non_null": _n_non_null,
            "n_total": _n_total,
            "n_unique": int(_s.nunique()),
            "nulls_fraction": float((_n_total - _n_non_null) / _n_total) if _n_total else 0.0,
            "numeric": _numeric,
            "top_values": _top_values,
        }})
    return {{
        "rows": int(_df.shape[0]),
        "cols": int(_df.shape[1]),
        "memory_bytes": int(_df.memory_usage(deep=True).sum()),
        "columns": _cols,
    }}

_dasa_json.dumps(_dasa_profile_probe({variable}))"#
    )
}

/// Profiles `variable` by injecting a self-contained pandas probe (§4.8:
/// "the engine injects a small, self-contained probe into the Interpreter
/// Session") and parsing its JSON result, grounded on
/// `dasa.analysis.profiler.Profiler.profile_dataframe`'s `PROFILE_CODE`.
pub async fn profile_variable(session: &mut dyn InterpreterSession, variable: &str) -> Result<TableProfile, DasaError> {
    let result = session
        .execute(&probe_source(variable), PROBE_TIMEOUT)
        .await?;
    if !result.success {
        return Err(DasaError::probe_failed(
            result.error_message.unwrap_or_else(|| "live profile probe failed".to_string()),
        ));
    }
    let raw_json = result
        .display_value
        .ok_or_else(|| DasaError::probe_failed("profile probe returned no value"))?;
    let raw: RawTable = serde_json::from_str(&raw_json).map_err(|e| DasaError::probe_failed(format!("malformed probe result: {e}")))?;

    let mut profile = TableProfile {
        name: variable.to_string(),
        rows: raw.rows,
        cols: raw.cols,
        memory_bytes: raw.memory_bytes,
        columns: raw
            .columns
            .into_iter()
            .map(|c| ColumnProfile {
                name: c.name,
                declared_type: c.declared_type,
                n_non_null: c.n_non_null,
                n_total: c.n_total,
                n_unique: c.n_unique,
                nulls_fraction: c.nulls_fraction,
                numeric: c.numeric.map(|n| NumericStats {
                    min: n.min,
                    max: n.max,
                    mean: n.mean,
                    std: n.std,
                }),
                top_values: c.top_values,
                issues: Vec::new(),
            })
            .collect(),
        global_issues: Vec::new(),
    };
    profile.finalize();
    Ok(profile)
}

#[derive(Debug, Clone)]
pub struct TabularVariableSummary {
    pub name: String,
    pub shape: (usize, usize),
    pub approx_memory_bytes: usize,
}

/// Self-contained probe that scans the session's globals for anything
/// exposing `columns`/`shape` (i.e. DataFrame-shaped), same inline-probe
/// convention as `profile_source` and `enrichment.rs`'s probes.
fn discover_probe_source() -> &'static str {
    r#"import json as _dasa_json

def _dasa_discover_tabular():
    _found = []
    for _name, _val in list(globals().items()):
        if _name.startswith("_"):
            continue
        if hasattr(_val, "columns") and hasattr(_val, "shape"):
            _mem = int(_val.memory_usage(deep=True).sum()) if hasattr(_val, "memory_usage") else 0
            _found.append({
                "name": _name,
                "rows": int(_val.shape[0]),
                "cols": int(_val.shape[1]),
                "memory_bytes": _mem,
            })
    return _found

_dasa_json.dumps(_dasa_discover_tabular())"#
}

/// Auto-discovery: lists variables exposing a `columns` attribute.
pub async fn discover_tabular_variables(session: &mut dyn InterpreterSession) -> Result<Vec<TabularVariableSummary>, DasaError> {
    let probe = discover_probe_source().to_string();
    let result = session.execute(&probe, PROBE_TIMEOUT).await?;
    if !result.success {
        return Err(DasaError::probe_failed(
            result.error_message.unwrap_or_else(|| "tabular discovery probe failed".to_string()),
        ));
    }
    let raw_json = result
        .display_value
        .ok_or_else(|| DasaError::probe_failed("discovery probe returned no value"))?;

    #[derive(Deserialize)]
    struct RawSummary {
        name: String,
        rows: usize,
        cols: usize,
        memory_bytes: usize,
    }
    let raw: Vec<RawSummary> =
        serde_json::from_str(&raw_json).map_err(|e| DasaError::probe_failed(format!("malformed discovery result: {e}")))?;

    Ok(raw
        .into_iter()
        .map(|r| TabularVariableSummary {
            name: r.name,
            shape: (r.rows, r.cols),
            approx_memory_bytes: r.memory_bytes,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::fake::FakeInterpreterSession;
    use crate::interpreter::ExecutionResult;

    #[tokio::test]
    async fn parses_probe_json_into_table_profile() {
        let mut session = FakeInterpreterSession::new();
        let json = r#"{"rows":3,"cols":2,"memory_bytes":48,"columns":[
            {"name":"revenue","declared_type":"int","n_non_null":3,"n_total":3,"n_unique":3,"nulls_fraction":0.0,"numeric":{"min":-5.0,"max":10.0,"mean":2.0,"std":6.0}}
        ]}"#;
        session.script(
            &probe_source("df"),
            ExecutionResult {
                success: true,
                display_value: Some(json.to_string()),
                ..Default::default()
            },
        );
        let profile = profile_variable(&mut session, "df").await.unwrap();
        assert_eq!(profile.rows, 3);
        assert!(profile.columns[0].issues.iter().any(|i| i.contains("negative")));
    }

    #[tokio::test]
    async fn probe_failure_surfaces_as_probe_failed() {
        let mut session = FakeInterpreterSession::new();
        session.script(
            &probe_source("missing"),
            ExecutionResult {
                success: false,
                error_message: Some("no such variable".to_string()),
                ..Default::default()
            },
        );
        let err = profile_variable(&mut session, "missing").await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ProbeFailed);
    }
}
