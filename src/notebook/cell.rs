//! Format-agnostic notebook and cell types (spec §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

/// A single notebook cell. Identity is `(notebook, positional index)`; the
/// index itself is not stored here, it is the cell's position in
/// `Notebook::cells`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub kind: CellKind,
    pub source: String,
    #[serde(default)]
    pub outputs: Vec<serde_json::Value>,
    pub execution_counter: Option<u32>,
}

impl Cell {
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            source: source.into(),
            outputs: Vec::new(),
            execution_counter: None,
        }
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Markdown,
            source: source.into(),
            outputs: Vec::new(),
            execution_counter: None,
        }
    }

    pub fn was_run_by_host(&self) -> bool {
        self.execution_counter.is_some()
    }
}

/// An ordered sequence of cells plus lightweight metadata. Canonical order is
/// the sequence itself; execution order is a derived view (§3).
#[derive(Debug, Clone, Default)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    pub interpreter_hint: Option<String>,
    pub source_path: Option<std::path::PathBuf>,
    pub read_only: bool,
}

impl Notebook {
    pub fn code_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == CellKind::Code)
    }

    /// Indices of executed cells (non-`None` `execution_counter`), sorted by
    /// counter ascending — the observed host execution order.
    pub fn execution_order(&self) -> Vec<usize> {
        let mut ordered: Vec<(u32, usize)> = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.execution_counter.map(|n| (n, i)))
            .collect();
        ordered.sort_by_key(|(n, _)| *n);
        ordered.into_iter().map(|(_, i)| i).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_order_sorts_by_counter() {
        let mut nb = Notebook::default();
        nb.cells.push(Cell {
            execution_counter: Some(3),
            ..Cell::code("a")
        });
        nb.cells.push(Cell {
            execution_counter: Some(1),
            ..Cell::code("b")
        });
        nb.cells.push(Cell::code("c"));
        assert_eq!(nb.execution_order(), vec![1, 0]);
    }

    #[test]
    fn code_cells_filters_markdown() {
        let mut nb = Notebook::default();
        nb.cells.push(Cell::markdown("# title"));
        nb.cells.push(Cell::code("x = 1"));
        let codes: Vec<usize> = nb.code_cells().map(|(i, _)| i).collect();
        assert_eq!(codes, vec![1]);
    }
}
