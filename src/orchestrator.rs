//! Command Orchestrator (§4.12): composes the core components into the
//! five user-facing operations plus `check --fix`.
//!
//! Grounded on `dasa.cli.commands` / `dasa.orchestrator.Orchestrator`.

use crate::deps::DependencyGraph;
use crate::enrichment::{self, ErrorContext};
use crate::error::DasaError;
use crate::interpreter::{ExecutionResult, InterpreterSession};
use crate::journal::ExecutionJournal;
use crate::notebook::store::NotebookStore;
use crate::notebook::Notebook;
use crate::parser::analyze;
use crate::profile::{self, TableProfile};
use crate::project_memory::{ProjectContext, ProjectMemory};
use crate::state::{StateAnalyzer, StateReport};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which cells a `run` invocation targets (§4.12 step 1).
#[derive(Debug, Clone)]
pub enum CellSelector {
    Single(usize),
    From(usize),
    To(usize),
    All,
    StaleOnly,
}

#[derive(Debug, Clone)]
pub struct CellRunResult {
    pub index: usize,
    pub success: bool,
    pub wall_time_seconds: f64,
    pub stdout: Option<String>,
    pub display_value: Option<String>,
    pub error_context: Option<ErrorContext>,
    pub stale_downstream: Vec<usize>,
}

pub struct CommandOrchestrator {
    metadata_dir: PathBuf,
}

impl CommandOrchestrator {
    pub fn new(metadata_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
        }
    }

    fn journal(&self) -> ExecutionJournal {
        ExecutionJournal::new(self.metadata_dir.join("state.json"))
    }

    fn memory(&self) -> ProjectMemory {
        crate::paths::ensure_session(&self.metadata_dir).ok();
        ProjectMemory::global(&self.metadata_dir)
    }

    fn memory_for(&self, notebook_path: &Path) -> ProjectMemory {
        crate::paths::ensure_session(&self.metadata_dir).ok();
        ProjectMemory::for_notebook(&self.metadata_dir, notebook_path)
    }

    // ---- profile ----------------------------------------------------

    pub fn profile_file(&self, file: &Path) -> Result<TableProfile, DasaError> {
        let profile = profile::profile_file(file)?;
        self.memory().profiles.store(&profile)?;
        Ok(profile)
    }

    pub async fn profile_variable(
        &self,
        session: &mut dyn InterpreterSession,
        notebook_path: &Path,
        variable: &str,
    ) -> Result<TableProfile, DasaError> {
        let table = profile::profile_variable(session, variable).await?;
        self.memory_for(notebook_path).profiles.store(&table)?;
        Ok(table)
    }

    // ---- check --------------------------------------------------------

    pub fn check(&self, notebook_path: &Path) -> Result<StateReport, DasaError> {
        let notebook = NotebookStore::load(notebook_path)?;
        let journal = self.journal();
        Ok(StateAnalyzer::new(&journal).analyze(&notebook, notebook_path))
    }

    pub fn check_impact(&self, notebook_path: &Path, cell: usize) -> Result<Vec<usize>, DasaError> {
        let notebook = NotebookStore::load(notebook_path)?;
        Ok(build_graph(&notebook).downstream(cell))
    }

    /// `check --fix` (§4.12): replay every executed cell before the first
    /// repair target, then execute repair targets in order.
    pub async fn check_fix(
        &self,
        session: &mut dyn InterpreterSession,
        notebook_path: &Path,
        timeout: Duration,
    ) -> Result<Vec<CellRunResult>, DasaError> {
        let notebook = NotebookStore::load(notebook_path)?;
        let journal = self.journal();
        let report = StateAnalyzer::new(&journal).analyze(&notebook, notebook_path);

        let mut repair_targets: Vec<usize> = report
            .issues
            .iter()
            .filter(|issue| issue.message == "never executed" || issue.message.starts_with("stale"))
            .filter_map(|issue| issue.cell_index)
            .collect();
        repair_targets.sort_unstable();
        repair_targets.dedup();

        if repair_targets.is_empty() {
            return Ok(Vec::new());
        }
        self.run_with_selector(session, notebook_path, &notebook, CellSelector::StaleOnly, timeout, Some(repair_targets))
            .await
    }

    // ---- run ------------------------------------------------------------

    pub async fn run(
        &self,
        session: &mut dyn InterpreterSession,
        notebook_path: &Path,
        selector: CellSelector,
        timeout: Duration,
    ) -> Result<Vec<CellRunResult>, DasaError> {
        let notebook = NotebookStore::load(notebook_path)?;
        self.run_with_selector(session, notebook_path, &notebook, selector, timeout, None).await
    }

    async fn run_with_selector(
        &self,
        session: &mut dyn InterpreterSession,
        notebook_path: &Path,
        notebook: &Notebook,
        selector: CellSelector,
        timeout: Duration,
        explicit_targets: Option<Vec<usize>>,
    ) -> Result<Vec<CellRunResult>, DasaError> {
        let journal = self.journal();
        let code_indices: Vec<usize> = notebook.code_cells().map(|(i, _)| i).collect();

        let targets: Vec<usize> = match explicit_targets {
            Some(t) => t,
            None => resolve_targets(&selector, &code_indices, notebook, &journal, notebook_path),
        };
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let first_target = *targets.iter().min().unwrap();
        session.start().await.ok();

        for &index in &code_indices {
            if index >= first_target {
                break;
            }
            let cell = &notebook.cells[index];
            let should_replay = cell.was_run_by_host() || journal.was_executed_current(notebook_path, index, &cell.source);
            if should_replay {
                session.execute(&cell.source, timeout).await.ok();
            }
        }

        let graph = build_graph(notebook);
        let memory = self.memory_for(notebook_path);
        let profile_cache = memory.profiles.column_index();

        let mut results = Vec::new();
        let mut any_failed = false;
        for &index in &targets {
            let Some(cell) = notebook.cells.get(index) else {
                continue;
            };
            let result = match session.execute(&cell.source, timeout).await {
                Ok(r) => r,
                Err(e) => ExecutionResult::transport_failure(e.to_string()),
            };

            let error_context = if result.success {
                None
            } else {
                Some(enrichment::enrich(&result, &cell.source, &profile_cache, Some(&mut *session)).await)
            };

            if result.success {
                journal.update(notebook_path, index, &cell.source)?;
            } else {
                any_failed = true;
            }

            let stale_downstream = if result.success { graph.downstream(index) } else { Vec::new() };

            memory.log.append(
                "run",
                &format!("cell {index}: {}", if result.success { "succeeded" } else { "failed" }),
            )?;

            results.push(CellRunResult {
                index,
                success: result.success,
                wall_time_seconds: result.wall_time_seconds,
                stdout: if result.stdout.is_empty() { None } else { Some(result.stdout) },
                display_value: result.display_value,
                error_context,
                stale_downstream,
            });
        }

        let _ = any_failed;
        Ok(results)
    }

    // ---- context ----------------------------------------------------------

    pub fn context_read(&self) -> ProjectContext {
        self.memory().context.read()
    }

    pub fn context_write(&self, context: &ProjectContext) -> Result<(), DasaError> {
        self.memory().context.write(context)
    }

    pub fn context_log(&self, last: usize) -> Vec<String> {
        self.memory().log.tail(last)
    }

    // ---- replay -------------------------------------------------------

    pub async fn replay(
        &self,
        session: &mut dyn InterpreterSession,
        notebook_path: &Path,
        timeout: Duration,
    ) -> Result<crate::replay::ReplaySummary, DasaError> {
        let notebook = NotebookStore::load(notebook_path)?;
        Ok(crate::replay::replay(session, &notebook, timeout).await)
    }
}

fn build_graph(notebook: &Notebook) -> DependencyGraph {
    let code_cells: Vec<(usize, &crate::notebook::Cell)> = notebook.code_cells().collect();
    let sources: Vec<&str> = code_cells.iter().map(|(_, c)| c.source.as_str()).collect();
    let analyses: Vec<_> = sources.iter().map(|s| analyze(s)).collect();
    DependencyGraph::build(&analyses, &sources)
}

fn resolve_targets(
    selector: &CellSelector,
    code_indices: &[usize],
    notebook: &Notebook,
    journal: &ExecutionJournal,
    notebook_path: &Path,
) -> Vec<usize> {
    match selector {
        CellSelector::Single(i) => vec![*i],
        CellSelector::From(start) => code_indices.iter().copied().filter(|i| i >= start).collect(),
        CellSelector::To(end) => code_indices.iter().copied().filter(|i| i <= end).collect(),
        CellSelector::All => code_indices.to_vec(),
        CellSelector::StaleOnly => code_indices
            .iter()
            .copied()
            .filter(|&i| {
                let cell = &notebook.cells[i];
                !cell.was_run_by_host() && !journal.was_executed_current(notebook_path, i, &cell.source)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::fake::FakeInterpreterSession;
    use tempfile::TempDir;

    fn write_notebook(tmp: &TempDir, name: &str) -> PathBuf {
        let path = tmp.path().join(name);
        let content = serde_json::json!({
            "cells": [
                {"cell_type": "code", "source": "x = 1", "outputs": [], "execution_count": null},
                {"cell_type": "code", "source": "y = x + 1", "outputs": [], "execution_count": null}
            ],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 5
        });
        std::fs::write(&path, content.to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn run_all_executes_every_cell_and_updates_journal() {
        let tmp = TempDir::new().unwrap();
        let nb_path = write_notebook(&tmp, "nb.ipynb");
        let orchestrator = CommandOrchestrator::new(tmp.path().join(".dasa"));
        let mut session = FakeInterpreterSession::new();

        let results = orchestrator.run(&mut session, &nb_path, CellSelector::All, Duration::from_secs(5)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));

        let report = orchestrator.check(&nb_path).unwrap();
        assert!(report.consistent);
    }

    #[tokio::test]
    async fn run_single_replays_predecessors() {
        let tmp = TempDir::new().unwrap();
        let nb_path = write_notebook(&tmp, "nb.ipynb");
        let orchestrator = CommandOrchestrator::new(tmp.path().join(".dasa"));
        let mut session = FakeInterpreterSession::new();

        let results = orchestrator
            .run(&mut session, &nb_path, CellSelector::Single(1), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
    }

    #[test]
    fn context_round_trips_through_memory() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = CommandOrchestrator::new(tmp.path().join(".dasa"));
        let mut ctx = ProjectContext::default();
        ctx.goal = Some("ship it".to_string());
        orchestrator.context_write(&ctx).unwrap();
        assert_eq!(orchestrator.context_read().goal.as_deref(), Some("ship it"));
    }
}
