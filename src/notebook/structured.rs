//! Structured (Jupyter-style v4) notebook format: load and save.
//!
//! Grounded on the teacher's `converter/notebook.rs` `JupyterNotebook`/
//! `JupyterCell` shape, generalized from a fixed `ruchy` kernelspec to a
//! caller-supplied `interpreter_hint` and reworked to round-trip through our
//! `Cell`/`Notebook` model instead of a one-way demo-to-jupyter conversion.

use crate::error::DasaError;
use crate::notebook::cell::{Cell, CellKind, Notebook};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNotebook {
    cells: Vec<RawCell>,
    #[serde(default)]
    metadata: JsonValue,
    nbformat: u32,
    nbformat_minor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cell_type")]
enum RawCell {
    #[serde(rename = "markdown")]
    Markdown {
        source: SourceField,
        #[serde(default)]
        metadata: JsonValue,
    },
    #[serde(rename = "raw")]
    Raw {
        source: SourceField,
        #[serde(default)]
        metadata: JsonValue,
    },
    #[serde(rename = "code")]
    Code {
        source: SourceField,
        #[serde(default)]
        outputs: Vec<JsonValue>,
        execution_count: Option<u32>,
        #[serde(default)]
        metadata: JsonValue,
    },
}

/// Jupyter notebooks serialize `source` as either a single string or an
/// array of lines; accept and normalize both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SourceField {
    Lines(Vec<String>),
    Joined(String),
}

impl SourceField {
    fn into_string(self) -> String {
        match self {
            SourceField::Lines(lines) => lines.join(""),
            SourceField::Joined(s) => s,
        }
    }

    fn from_string(s: &str) -> Self {
        SourceField::Lines(s.lines().map(|l| format!("{l}\n")).collect())
    }
}

pub fn load(path: &Path) -> Result<Notebook, DasaError> {
    let content = std::fs::read_to_string(path)?;
    let raw: RawNotebook = serde_json::from_str(&content)?;
    let cells = raw
        .cells
        .into_iter()
        .map(|c| match c {
            RawCell::Markdown { source, .. } => Cell {
                kind: CellKind::Markdown,
                source: source.into_string(),
                outputs: Vec::new(),
                execution_counter: None,
            },
            RawCell::Raw { source, .. } => Cell {
                kind: CellKind::Raw,
                source: source.into_string(),
                outputs: Vec::new(),
                execution_counter: None,
            },
            RawCell::Code {
                source,
                outputs,
                execution_count,
                ..
            } => Cell {
                kind: CellKind::Code,
                source: source.into_string(),
                outputs,
                execution_counter: execution_count,
            },
        })
        .collect();
    Ok(Notebook {
        cells,
        interpreter_hint: raw
            .metadata
            .get("kernelspec")
            .and_then(|k| k.get("name"))
            .and_then(|n| n.as_str())
            .map(String::from),
        source_path: Some(path.to_path_buf()),
        read_only: false,
    })
}

pub fn save(notebook: &Notebook, path: &Path) -> Result<(), DasaError> {
    let raw_cells: Vec<RawCell> = notebook
        .cells
        .iter()
        .map(|cell| match cell.kind {
            CellKind::Markdown => RawCell::Markdown {
                source: SourceField::from_string(&cell.source),
                metadata: serde_json::json!({}),
            },
            CellKind::Raw => RawCell::Raw {
                source: SourceField::from_string(&cell.source),
                metadata: serde_json::json!({}),
            },
            CellKind::Code => RawCell::Code {
                source: SourceField::from_string(&cell.source),
                outputs: cell.outputs.clone(),
                execution_count: cell.execution_counter,
                metadata: serde_json::json!({}),
            },
        })
        .collect();
    let raw = RawNotebook {
        cells: raw_cells,
        metadata: serde_json::json!({
            "kernelspec": {
                "display_name": notebook.interpreter_hint.clone().unwrap_or_else(|| "python3".to_string()),
                "language": "python",
                "name": notebook.interpreter_hint.clone().unwrap_or_else(|| "python3".to_string()),
            }
        }),
        nbformat: 4,
        nbformat_minor: 5,
    };
    let json = serde_json::to_string_pretty(&raw)?;
    crate::atomic::write_atomic(path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trip_preserves_outputs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nb.ipynb");
        let mut nb = Notebook::default();
        nb.cells.push(Cell {
            kind: CellKind::Code,
            source: "x = 1\n".to_string(),
            outputs: vec![serde_json::json!({"output_type": "stream", "text": "1\n"})],
            execution_counter: Some(1),
        });
        save(&nb, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.cells.len(), 1);
        assert_eq!(loaded.cells[0].source, "x = 1\n");
        assert_eq!(loaded.cells[0].execution_counter, Some(1));
        assert_eq!(loaded.cells[0].outputs.len(), 1);
    }

    #[test]
    fn accepts_joined_string_source() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nb.ipynb");
        std::fs::write(
            &path,
            r#"{"cells":[{"cell_type":"code","source":"x = 1","outputs":[],"execution_count":null}],"metadata":{},"nbformat":4,"nbformat_minor":5}"#,
        )
        .unwrap();
        let nb = load(&path).unwrap();
        assert_eq!(nb.cells[0].source, "x = 1");
    }
}
