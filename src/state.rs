//! State Analyzer (§4.4): cross-references parsed cells with the Execution
//! Journal to detect undefined references, never-executed cells, staleness,
//! and out-of-order execution.
//!
//! Grounded on `dasa.analysis.state.StateAnalyzer`.

use crate::journal::ExecutionJournal;
use crate::notebook::Notebook;
use crate::parser::analyze;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StateIssue {
    /// `None` represents a whole-notebook issue (spec's `cell_index = -1`).
    pub cell_index: Option<usize>,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StateReport {
    pub consistent: bool,
    pub issues: Vec<StateIssue>,
    pub execution_order: Vec<usize>,
    pub canonical_order: Vec<usize>,
    pub defined_vars: HashMap<String, usize>,
    pub undefined_refs: Vec<(usize, String)>,
}

pub struct StateAnalyzer<'a> {
    journal: &'a ExecutionJournal,
}

impl<'a> StateAnalyzer<'a> {
    pub fn new(journal: &'a ExecutionJournal) -> Self {
        Self { journal }
    }

    pub fn analyze(&self, notebook: &Notebook, notebook_path: &Path) -> StateReport {
        let mut issues = Vec::new();
        let mut defined_vars: HashMap<String, usize> = HashMap::new();
        let mut undefined_refs = Vec::new();

        let code_indices: Vec<usize> = notebook.code_cells().map(|(i, _)| i).collect();
        let analyses: HashMap<usize, _> = code_indices
            .iter()
            .map(|&i| (i, analyze(&notebook.cells[i].source)))
            .collect();

        for &index in &code_indices {
            let analysis = &analyses[&index];
            for reference in &analysis.references {
                if !defined_vars.contains_key(reference) {
                    undefined_refs.push((index, reference.clone()));
                    issues.push(StateIssue {
                        cell_index: Some(index),
                        severity: Severity::Error,
                        message: format!("uses undefined variable '{reference}'"),
                        suggestion: None,
                    });
                }
            }
            for def in &analysis.definitions {
                defined_vars.insert(def.clone(), index);
            }
        }

        for &index in &code_indices {
            let cell = &notebook.cells[index];
            let executed_by_host = cell.was_run_by_host();
            let executed_current = self.journal.was_executed_current(notebook_path, index, &cell.source);
            let executed_at_all = executed_by_host || self.journal.was_executed(notebook_path, index);

            if !executed_at_all {
                issues.push(StateIssue {
                    cell_index: Some(index),
                    severity: Severity::Warning,
                    message: "never executed".to_string(),
                    suggestion: None,
                });
            } else if !executed_by_host && !executed_current {
                issues.push(StateIssue {
                    cell_index: Some(index),
                    severity: Severity::Warning,
                    message: "stale — code modified since last run".to_string(),
                    suggestion: None,
                });
            }
        }

        let execution_order = notebook.execution_order();
        let canonical_order: Vec<usize> = execution_order.iter().copied().collect::<std::collections::BTreeSet<_>>().into_iter().collect();
        let mut canonical_sorted = canonical_order.clone();
        canonical_sorted.sort_unstable();
        if execution_order != canonical_sorted {
            issues.push(StateIssue {
                cell_index: None,
                severity: Severity::Warning,
                message: "out-of-order execution detected".to_string(),
                suggestion: None,
            });
        }

        let consistent = !issues.iter().any(|i| i.severity == Severity::Error);

        StateReport {
            consistent,
            issues,
            execution_order,
            canonical_order: canonical_sorted,
            defined_vars,
            undefined_refs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::Cell;
    use tempfile::TempDir;

    fn notebook(sources: &[&str]) -> Notebook {
        let mut nb = Notebook::default();
        for s in sources {
            nb.cells.push(Cell::code(*s));
        }
        nb
    }

    #[test]
    fn undefined_reference_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let journal = ExecutionJournal::new(tmp.path().join("state.json"));
        let nb = notebook(&["y = x + 1"]);
        let report = StateAnalyzer::new(&journal).analyze(&nb, &tmp.path().join("nb.ipynb"));
        assert!(!report.consistent);
        assert!(report.undefined_refs.iter().any(|(_, n)| n == "x"));
    }

    #[test]
    fn never_executed_cell_is_a_warning_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let journal = ExecutionJournal::new(tmp.path().join("state.json"));
        let nb = notebook(&["x = 1"]);
        let report = StateAnalyzer::new(&journal).analyze(&nb, &tmp.path().join("nb.ipynb"));
        assert!(report.consistent);
        assert!(report.issues.iter().any(|i| i.message == "never executed"));
    }

    #[test]
    fn stale_after_journal_mismatch() {
        let tmp = TempDir::new().unwrap();
        let nb_path = tmp.path().join("nb.ipynb");
        std::fs::write(&nb_path, b"{}").unwrap();
        let journal = ExecutionJournal::new(tmp.path().join("state.json"));
        journal.update(&nb_path, 0, "x = 0").unwrap();
        let nb = notebook(&["x = 1"]);
        let report = StateAnalyzer::new(&journal).analyze(&nb, &nb_path);
        assert!(report.issues.iter().any(|i| i.message.starts_with("stale")));
    }

    #[test]
    fn host_executed_and_current_is_consistent_and_quiet() {
        let tmp = TempDir::new().unwrap();
        let nb_path = tmp.path().join("nb.ipynb");
        std::fs::write(&nb_path, b"{}").unwrap();
        let journal = ExecutionJournal::new(tmp.path().join("state.json"));
        journal.update(&nb_path, 0, "x = 1").unwrap();
        let mut nb = notebook(&["x = 1"]);
        nb.cells[0].execution_counter = Some(1);
        let report = StateAnalyzer::new(&journal).analyze(&nb, &nb_path);
        assert!(report.consistent);
        assert!(!report.issues.iter().any(|i| i.cell_index == Some(0)));
    }

    #[test]
    fn out_of_order_execution_is_flagged() {
        let tmp = TempDir::new().unwrap();
        let journal = ExecutionJournal::new(tmp.path().join("state.json"));
        let mut nb = notebook(&["x = 1", "y = 2"]);
        nb.cells[0].execution_counter = Some(2);
        nb.cells[1].execution_counter = Some(1);
        let report = StateAnalyzer::new(&journal).analyze(&nb, &tmp.path().join("nb.ipynb"));
        assert!(report.issues.iter().any(|i| i.cell_index.is_none() && i.message.contains("out-of-order")));
    }
}
