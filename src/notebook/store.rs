//! Format-agnostic notebook store: format detection, load/save dispatch, and
//! bounds-checked mutating operations (§4.1).

use crate::error::DasaError;
use crate::notebook::cell::{Cell, Notebook};
use crate::notebook::{reactive, structured};
use std::path::Path;

pub struct NotebookStore;

impl NotebookStore {
    /// Load a notebook, detecting format purely from the path's extension —
    /// no content sniffing.
    pub fn load(path: &Path) -> Result<Notebook, DasaError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ipynb") | Some("json") => structured::load(path),
            Some("py") => reactive::load(path),
            other => Err(DasaError::not_found(format!(
                "unrecognized notebook extension {other:?}; supported extensions are .ipynb, .json, .py"
            ))),
        }
    }

    /// Save a notebook back to disk. Only the structured format supports
    /// writing; reactive-script notebooks are read-only.
    pub fn save(notebook: &Notebook, path: &Path) -> Result<(), DasaError> {
        if notebook.read_only {
            return Err(DasaError::read_only(path.display()));
        }
        structured::save(notebook, path)
    }

    pub fn get<'a>(notebook: &'a Notebook, index: usize) -> Result<&'a Cell, DasaError> {
        notebook
            .cells
            .get(index)
            .ok_or_else(|| DasaError::index_out_of_range(index, notebook.len()))
    }

    /// Replace a cell's source, clearing its execution counter. Other cells
    /// are untouched.
    pub fn update(notebook: &mut Notebook, index: usize, source: String) -> Result<(), DasaError> {
        Self::guard_mutable(notebook)?;
        let cell = notebook
            .cells
            .get_mut(index)
            .ok_or_else(|| DasaError::index_out_of_range(index, notebook.len()))?;
        cell.source = source;
        cell.execution_counter = None;
        Ok(())
    }

    pub fn insert(notebook: &mut Notebook, index: usize, cell: Cell) -> Result<(), DasaError> {
        Self::guard_mutable(notebook)?;
        if index > notebook.len() {
            return Err(DasaError::index_out_of_range(index, notebook.len()));
        }
        notebook.cells.insert(index, cell);
        Ok(())
    }

    pub fn delete(notebook: &mut Notebook, index: usize) -> Result<Cell, DasaError> {
        Self::guard_mutable(notebook)?;
        if index >= notebook.len() {
            return Err(DasaError::index_out_of_range(index, notebook.len()));
        }
        Ok(notebook.cells.remove(index))
    }

    pub fn move_cell(notebook: &mut Notebook, from: usize, to: usize) -> Result<(), DasaError> {
        Self::guard_mutable(notebook)?;
        let len = notebook.len();
        if from >= len || to >= len {
            return Err(DasaError::index_out_of_range(from.max(to), len));
        }
        let cell = notebook.cells.remove(from);
        notebook.cells.insert(to, cell);
        Ok(())
    }

    fn guard_mutable(notebook: &Notebook) -> Result<(), DasaError> {
        if notebook.read_only {
            let path = notebook
                .source_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<notebook>".to_string());
            return Err(DasaError::read_only(path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::cell::CellKind;

    fn sample() -> Notebook {
        let mut nb = Notebook::default();
        nb.cells.push(Cell::code("a = 1"));
        nb.cells.push(Cell::code("b = a + 1"));
        nb
    }

    #[test]
    fn update_clears_execution_counter_of_target_only() {
        let mut nb = sample();
        nb.cells[0].execution_counter = Some(1);
        nb.cells[1].execution_counter = Some(2);
        NotebookStore::update(&mut nb, 0, "a = 2".to_string()).unwrap();
        assert_eq!(nb.cells[0].execution_counter, None);
        assert_eq!(nb.cells[1].execution_counter, Some(2));
    }

    #[test]
    fn insert_out_of_range_errors() {
        let mut nb = sample();
        let err = NotebookStore::insert(&mut nb, 5, Cell::code("c = 1")).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn delete_reindexes_remaining_cells() {
        let mut nb = sample();
        nb.cells.push(Cell::code("c = b + 1"));
        NotebookStore::delete(&mut nb, 0).unwrap();
        assert_eq!(nb.len(), 2);
        assert_eq!(nb.cells[0].source, "b = a + 1");
    }

    #[test]
    fn mutation_on_read_only_notebook_fails() {
        let mut nb = sample();
        nb.read_only = true;
        let err = NotebookStore::update(&mut nb, 0, "x = 1".to_string()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ReadOnlyNotebook);
    }

    #[test]
    fn move_cell_reorders() {
        let mut nb = sample();
        nb.cells.push(Cell::code("c = 1"));
        NotebookStore::move_cell(&mut nb, 2, 0).unwrap();
        assert_eq!(nb.cells[0].source, "c = 1");
        assert_eq!(nb.cells[0].kind, CellKind::Code);
    }
}
