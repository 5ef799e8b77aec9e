//! In-memory `InterpreterSession` double. No subprocess, no I/O — lets
//! `profile`, `enrichment`, `replay`, and orchestrator tests exercise
//! execution semantics without a real Python interpreter on the test host.

use crate::error::DasaError;
use crate::interpreter::{ExecutionResult, InterpreterSession, SessionPhase};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A scripted or simple-evaluator in-memory session.
///
/// If `scripted` has an entry for the submitted source (exact match), that
/// result is returned verbatim. Otherwise falls back to a toy evaluator that
/// understands `name = <int literal>` assignments and bare-name lookups,
/// which is enough to drive Error Enrichment and Replay tests without a real
/// interpreter.
pub struct FakeInterpreterSession {
    phase: SessionPhase,
    vars: HashMap<String, String>,
    scripted: HashMap<String, ExecutionResult>,
}

impl Default for FakeInterpreterSession {
    fn default() -> Self {
        Self {
            phase: SessionPhase::NotStarted,
            vars: HashMap::new(),
            scripted: HashMap::new(),
        }
    }
}

impl FakeInterpreterSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a canned result for an exact source string.
    pub fn script(&mut self, source: impl Into<String>, result: ExecutionResult) {
        self.scripted.insert(source.into(), result);
    }

    pub fn visible_names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }

    fn eval(&mut self, source: &str) -> ExecutionResult {
        if let Some(scripted) = self.scripted.get(source) {
            return scripted.clone();
        }
        let mut result = ExecutionResult {
            success: true,
            ..Default::default()
        };
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((name, value)) = line.split_once('=') {
                let name = name.trim();
                let value = value.trim();
                if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    self.vars.insert(name.to_string(), value.to_string());
                    continue;
                }
            }
            if line.chars().all(|c| c.is_alphanumeric() || c == '_') {
                match self.vars.get(line) {
                    Some(value) => result.display_value = Some(value.clone()),
                    None => {
                        result.success = false;
                        result.error_kind = Some("NameError".to_string());
                        result.error_message = Some(format!("name '{line}' is not defined"));
                        result.traceback_frames = vec![format!("NameError: name '{line}' is not defined")];
                    }
                }
            }
        }
        result
    }
}

impl InterpreterSession for FakeInterpreterSession {
    fn start(&mut self) -> BoxFuture<'_, Result<(), DasaError>> {
        self.phase = SessionPhase::Ready;
        Box::pin(async { Ok(()) })
    }

    fn execute(&mut self, source: &str, _timeout: Duration) -> BoxFuture<'_, Result<ExecutionResult, DasaError>> {
        let result = self.eval(source);
        Box::pin(async move { Ok(result) })
    }

    fn execute_streaming(
        &mut self,
        source: &str,
        _timeout: Duration,
        mut on_chunk: Box<dyn FnMut(bool, &str) + Send + '_>,
    ) -> BoxFuture<'_, Result<ExecutionResult, DasaError>> {
        let result = self.eval(source);
        if !result.stdout.is_empty() {
            on_chunk(true, &result.stdout);
        }
        if !result.stderr.is_empty() {
            on_chunk(false, &result.stderr);
        }
        Box::pin(async move { Ok(result) })
    }

    fn interrupt(&mut self) -> BoxFuture<'_, Result<(), DasaError>> {
        Box::pin(async { Ok(()) })
    }

    fn restart(&mut self) -> BoxFuture<'_, Result<(), DasaError>> {
        self.vars.clear();
        self.phase = SessionPhase::Ready;
        Box::pin(async { Ok(()) })
    }

    fn shutdown(&mut self) -> BoxFuture<'_, Result<(), DasaError>> {
        self.phase = SessionPhase::Shutdown;
        Box::pin(async { Ok(()) })
    }

    fn phase(&self) -> SessionPhase {
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assignment_then_lookup_round_trips() {
        let mut session = FakeInterpreterSession::new();
        session.start().await.unwrap();
        session.execute("x = 1", Duration::from_secs(1)).await.unwrap();
        let result = session.execute("x", Duration::from_secs(1)).await.unwrap();
        assert_eq!(result.display_value.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn undefined_name_produces_name_error() {
        let mut session = FakeInterpreterSession::new();
        session.start().await.unwrap();
        let result = session.execute("missing", Duration::from_secs(1)).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("NameError"));
    }

    #[tokio::test]
    async fn scripted_result_overrides_evaluator() {
        let mut session = FakeInterpreterSession::new();
        session.script("boom", ExecutionResult::transport_failure("wire broke"));
        session.start().await.unwrap();
        let result = session.execute("boom", Duration::from_secs(1)).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("Transport"));
    }

    #[tokio::test]
    async fn restart_clears_variables() {
        let mut session = FakeInterpreterSession::new();
        session.start().await.unwrap();
        session.execute("x = 1", Duration::from_secs(1)).await.unwrap();
        session.restart().await.unwrap();
        let result = session.execute("x", Duration::from_secs(1)).await.unwrap();
        assert!(!result.success);
    }
}
