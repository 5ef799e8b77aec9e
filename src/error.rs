//! Error carrier for the whole crate.
//!
//! Every public, fallible function returns `Result<T, DasaError>`. Unlike a
//! stringly-typed error this keeps a closed `ErrorKind` tag so the
//! orchestrator can decide propagation policy (§7) without string matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for toolkit operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DasaError {
    pub kind: ErrorKind,
    pub message: String,
    pub help: Option<String>,
}

/// Closed error taxonomy (spec §7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    IndexOutOfRange,
    ReadOnlyNotebook,
    ParseFailure,
    KernelStartFailed,
    Timeout,
    Transport,
    ProbeFailed,
    Corruption,
    Interrupted,
}

impl DasaError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfRange,
            format!("cell index {index} out of range (notebook has {len} cells)"),
        )
    }

    pub fn read_only(path: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::ReadOnlyNotebook,
            format!("{path} is a reactive-script notebook and cannot be mutated"),
        )
    }

    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailure, message)
    }

    pub fn kernel_start_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KernelStartFailed, message)
    }

    pub fn timeout(seconds: f64) -> Self {
        Self::new(ErrorKind::Timeout, format!("execution timed out after {seconds}s"))
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn probe_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProbeFailed, message)
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corruption, message)
    }

    pub fn interrupted() -> Self {
        Self::new(ErrorKind::Interrupted, "execution was interrupted")
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::IndexOutOfRange => "IndexOutOfRange",
            ErrorKind::ReadOnlyNotebook => "ReadOnlyNotebook",
            ErrorKind::ParseFailure => "ParseFailure",
            ErrorKind::KernelStartFailed => "KernelStartFailed",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Transport => "Transport",
            ErrorKind::ProbeFailed => "ProbeFailed",
            ErrorKind::Corruption => "Corruption",
            ErrorKind::Interrupted => "Interrupted",
        }
    }

    pub fn formatted_message(&self) -> String {
        let mut result = format!("{}: {}", self.kind_name(), self.message);
        if let Some(help) = &self.help {
            result.push_str(&format!("\n\nHelp: {help}"));
        }
        result
    }
}

impl fmt::Display for DasaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted_message())
    }
}

impl std::error::Error for DasaError {}

impl From<std::io::Error> for DasaError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DasaError::not_found(err.to_string()),
            _ => DasaError::new(ErrorKind::Corruption, err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DasaError {
    fn from(err: serde_json::Error) -> Self {
        DasaError::new(ErrorKind::Corruption, format!("JSON error: {err}"))
    }
}

impl From<serde_yml::Error> for DasaError {
    fn from(err: serde_yml::Error) -> Self {
        DasaError::new(ErrorKind::Corruption, format!("YAML error: {err}"))
    }
}

impl From<anyhow::Error> for DasaError {
    fn from(err: anyhow::Error) -> Self {
        DasaError::new(ErrorKind::Transport, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let err = DasaError::parse_failure("unexpected token").with_help("check the cell source");
        assert_eq!(err.kind, ErrorKind::ParseFailure);
        assert!(err.help.is_some());
    }

    #[test]
    fn formatted_message_includes_help() {
        let err = DasaError::index_out_of_range(5, 3);
        let msg = err.formatted_message();
        assert!(msg.contains("IndexOutOfRange"));
        assert!(msg.contains("5"));
    }

    #[test]
    fn io_not_found_maps_to_not_found_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DasaError = io_err.into();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
