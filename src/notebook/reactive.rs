//! Reactive-script notebook format: read-only `.py` files where cells are
//! functions decorated with an app-attached `cell` marker, e.g.:
//!
//! ```python
//! @app.cell
//! def _(x, y):
//!     z = x + y
//!     return z
//! ```
//!
//! Parsed by walking the file's top-level structure rather than a full
//! Python grammar: a decorator line matching the marker, followed by a `def`
//! line, opens a cell; the cell's body is every subsequent indented line
//! until the next top-level (non-blank, non-indented) line. The function's
//! formal parameters are its declared upstream dependencies, but since the
//! Dependency Graph (§4.3) derives edges from the Cell Parser's own
//! definition/reference analysis, we only need the dedented body here —
//! the parameter names fall out of the body source naturally once the
//! reactive file's own variable-passing convention mirrors the structured
//! format's name-based linkage.

use crate::error::DasaError;
use crate::notebook::cell::{Cell, CellKind, Notebook};
use regex::Regex;
use std::path::Path;

const CELL_MARKER: &str = "@app.cell";

pub fn load(path: &Path) -> Result<Notebook, DasaError> {
    let content = std::fs::read_to_string(path)?;
    let cells = parse_cells(&content);
    Ok(Notebook {
        cells,
        interpreter_hint: Some("python3".to_string()),
        source_path: Some(path.to_path_buf()),
        read_only: true,
    })
}

fn parse_cells(content: &str) -> Vec<Cell> {
    let def_re = Regex::new(r"^def\s+\w+\s*\([^)]*\)\s*:").unwrap();
    let lines: Vec<&str> = content.lines().collect();
    let mut cells = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim_end();
        if line.trim_start() == CELL_MARKER {
            let mut j = i + 1;
            if j < lines.len() && def_re.is_match(lines[j].trim_start()) {
                j += 1;
                let mut body_lines = Vec::new();
                while j < lines.len() {
                    let l = lines[j];
                    let is_blank = l.trim().is_empty();
                    let is_indented = l.starts_with(' ') || l.starts_with('\t');
                    if !is_blank && !is_indented {
                        break;
                    }
                    body_lines.push(l);
                    j += 1;
                }
                let dedented = dedent(&body_lines);
                cells.push(Cell {
                    kind: CellKind::Code,
                    source: dedented,
                    outputs: Vec::new(),
                    execution_counter: None,
                });
                i = j;
                continue;
            }
        }
        i += 1;
    }
    cells
}

fn dedent(lines: &[&str]) -> String {
    let min_indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            if l.len() >= min_indent {
                &l[min_indent..]
            } else {
                l.trim_start()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decorated_cells() {
        let content = "\
@app.cell
def _(x, y):
    z = x + y
    return z

@app.cell
def _():
    a = 1
    return a
";
        let cells = parse_cells(content);
        assert_eq!(cells.len(), 2);
        assert!(cells[0].source.contains("z = x + y"));
        assert!(cells[1].source.contains("a = 1"));
    }

    #[test]
    fn load_marks_notebook_read_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nb.py");
        std::fs::write(&path, "@app.cell\ndef _():\n    x = 1\n    return x\n").unwrap();
        let nb = load(&path).unwrap();
        assert!(nb.read_only);
        assert_eq!(nb.cells.len(), 1);
    }
}
