pub mod fake;
pub mod protocol;
pub mod session;

use crate::error::DasaError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use fake::FakeInterpreterSession;
pub use session::SubprocessSession;

/// Lifecycle phase of an Interpreter Session (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Ready,
    Executing,
    Shutdown,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub display_value: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub traceback_frames: Vec<String>,
    pub wall_time_seconds: f64,
}

impl ExecutionResult {
    pub fn timeout(seconds: f64) -> Self {
        Self {
            success: false,
            error_kind: Some("Timeout".to_string()),
            error_message: Some(format!("execution timed out after {seconds}s")),
            wall_time_seconds: seconds,
            ..Default::default()
        }
    }

    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_kind: Some("Transport".to_string()),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn interrupted() -> Self {
        Self {
            success: false,
            error_kind: Some("Interrupted".to_string()),
            error_message: Some("execution was interrupted".to_string()),
            ..Default::default()
        }
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Contract shared by the real subprocess transport and the in-memory fake
/// used throughout non-subprocess tests (§9 design note). Object-safe via
/// manually boxed futures so callers can hold `Box<dyn InterpreterSession>`.
pub trait InterpreterSession: Send {
    fn start(&mut self) -> BoxFuture<'_, Result<(), DasaError>>;
    fn execute(&mut self, source: &str, timeout: Duration) -> BoxFuture<'_, Result<ExecutionResult, DasaError>>;
    fn execute_streaming(
        &mut self,
        source: &str,
        timeout: Duration,
        on_chunk: Box<dyn FnMut(bool, &str) + Send + '_>,
    ) -> BoxFuture<'_, Result<ExecutionResult, DasaError>>;
    fn interrupt(&mut self) -> BoxFuture<'_, Result<(), DasaError>>;
    fn restart(&mut self) -> BoxFuture<'_, Result<(), DasaError>>;
    fn shutdown(&mut self) -> BoxFuture<'_, Result<(), DasaError>>;
    fn phase(&self) -> SessionPhase;
}
