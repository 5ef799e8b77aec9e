//! Replay Engine (§4.11): cold re-execution of a whole notebook, comparing
//! each cell's freshly produced output against its saved output.
//!
//! Grounded on `dasa.replay.engine.ReplayEngine`.

use crate::interpreter::{ExecutionResult, InterpreterSession};
use crate::notebook::Notebook;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CellReplayResult {
    pub index: usize,
    pub success: bool,
    pub output_match: bool,
    pub fix_suggestion: Option<String>,
    pub wall_time_seconds: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub total_cells: usize,
    pub executed: usize,
    pub reproduced: usize,
    pub reproducibility_score: f64,
    pub total_time_seconds: f64,
    pub cells: Vec<CellReplayResult>,
}

fn saved_output_text(cell_outputs: &[serde_json::Value]) -> String {
    let mut text = String::new();
    for output in cell_outputs {
        if let Some(s) = output.get("text").and_then(|v| v.as_str()) {
            text.push_str(s);
        } else if let Some(data) = output.get("data") {
            if let Some(s) = data.get("text/plain").and_then(|v| v.as_str()) {
                text.push_str(s);
            }
        }
    }
    text
}

fn new_output_text(result: &ExecutionResult) -> String {
    let mut text = result.stdout.clone();
    if let Some(display) = &result.display_value {
        text.push_str(display);
    }
    text
}

fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn random_without_seed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\brandom\.|\bnp\.random\.|numpy\.random\.").unwrap())
}

fn fix_suggestion(source: &str, result: &ExecutionResult) -> Option<String> {
    match result.error_kind.as_deref() {
        Some("FileNotFoundError") => Some("avoid hardcoded absolute paths".to_string()),
        Some("ModuleNotFoundError") => {
            let message = result.error_message.as_deref().unwrap_or_default();
            let module = message
                .split('\'')
                .nth(1)
                .unwrap_or("the missing module");
            Some(format!("pip install {module}"))
        }
        Some("NameError") => Some("run in order from the beginning".to_string()),
        _ => {
            if random_without_seed_re().is_match(source) && !source.contains("seed") {
                Some("set a random seed".to_string())
            } else {
                None
            }
        }
    }
}

pub async fn replay(session: &mut dyn InterpreterSession, notebook: &Notebook, timeout: Duration) -> ReplaySummary {
    session.start().await.ok();
    let code_cells: Vec<(usize, &crate::notebook::Cell)> = notebook.code_cells().collect();
    let mut summary = ReplaySummary {
        total_cells: code_cells.len(),
        ..Default::default()
    };

    for (index, cell) in code_cells {
        let result = match session.execute(&cell.source, timeout).await {
            Ok(r) => r,
            Err(e) => ExecutionResult::transport_failure(e.to_string()),
        };
        summary.total_time_seconds += result.wall_time_seconds;
        summary.executed += 1;

        let saved = saved_output_text(&cell.outputs);
        let produced = new_output_text(&result);
        let output_match = result.success && digest(&saved) == digest(&produced);
        if output_match {
            summary.reproduced += 1;
        }

        let suggestion = if result.success && output_match {
            None
        } else {
            fix_suggestion(&cell.source, &result)
        };

        summary.cells.push(CellReplayResult {
            index,
            success: result.success,
            output_match,
            fix_suggestion: suggestion,
            wall_time_seconds: result.wall_time_seconds,
        });
    }

    summary.reproducibility_score = if summary.total_cells == 0 {
        1.0
    } else {
        summary.reproduced as f64 / summary.total_cells as f64
    };
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::fake::FakeInterpreterSession;
    use crate::notebook::Cell;
    use serde_json::json;

    #[tokio::test]
    async fn matching_outputs_score_full_reproducibility() {
        let mut nb = Notebook::default();
        let mut cell = Cell::code("x = 1");
        cell.outputs = vec![json!({"text": "1"})];
        nb.cells.push(cell);

        let mut session = FakeInterpreterSession::new();
        session.script(
            "x = 1",
            ExecutionResult {
                success: true,
                stdout: "1".to_string(),
                ..Default::default()
            },
        );
        let summary = replay(&mut session, &nb, Duration::from_secs(5)).await;
        assert_eq!(summary.reproducibility_score, 1.0);
        assert!(summary.cells[0].output_match);
    }

    #[tokio::test]
    async fn unseeded_random_gets_seed_suggestion() {
        let mut nb = Notebook::default();
        let mut cell = Cell::code("x = random.random()");
        cell.outputs = vec![json!({"text": "0.42"})];
        nb.cells.push(cell);

        let mut session = FakeInterpreterSession::new();
        session.script(
            "x = random.random()",
            ExecutionResult {
                success: true,
                stdout: "0.99".to_string(),
                ..Default::default()
            },
        );
        let summary = replay(&mut session, &nb, Duration::from_secs(5)).await;
        assert!(!summary.cells[0].output_match);
        assert_eq!(summary.cells[0].fix_suggestion.as_deref(), Some("set a random seed"));
    }

    #[tokio::test]
    async fn name_error_suggests_running_in_order() {
        let mut nb = Notebook::default();
        nb.cells.push(Cell::code("print(missing)"));

        let mut session = FakeInterpreterSession::new();
        session.script(
            "print(missing)",
            ExecutionResult {
                success: false,
                error_kind: Some("NameError".to_string()),
                error_message: Some("name 'missing' is not defined".to_string()),
                ..Default::default()
            },
        );
        let summary = replay(&mut session, &nb, Duration::from_secs(5)).await;
        assert_eq!(summary.cells[0].fix_suggestion.as_deref(), Some("run in order from the beginning"));
        assert_eq!(summary.reproducibility_score, 0.0);
    }
}
