//! Subprocess-backed Interpreter Session.
//!
//! Grounded on `dasa.notebook.kernel.KernelManager`: start/shutdown/restart/
//! interrupt/execute against a managed subprocess, adapted from a
//! `jupyter_client` ZeroMQ kernel to a plain `tokio::process::Child` speaking
//! newline-delimited JSON (§4.5, §9).

use crate::error::DasaError;
use crate::interpreter::protocol::{decode_message, encode_submission, ExecutionState, KernelMessage, StreamName, Submission};
use crate::interpreter::{ExecutionResult, InterpreterSession, SessionPhase};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const READY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SubprocessSession {
    command: String,
    args: Vec<String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    reader: Option<Lines<BufReader<ChildStdout>>>,
    phase: SessionPhase,
    next_id: u64,
}

impl SubprocessSession {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            child: None,
            stdin: None,
            reader: None,
            phase: SessionPhase::NotStarted,
            next_id: 0,
        }
    }

    fn next_submission_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    async fn do_start(&mut self) -> Result<(), DasaError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| DasaError::kernel_start_failed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DasaError::kernel_start_failed("no stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DasaError::kernel_start_failed("no stdout handle"))?;
        let mut lines = BufReader::new(stdout).lines();

        let ready = tokio::time::timeout(READY_TIMEOUT, lines.next_line()).await;
        match ready {
            Ok(Ok(Some(line))) => match decode_message(&line) {
                Some(KernelMessage::Ready) => {}
                _ => return Err(DasaError::kernel_start_failed("unexpected first message from kernel")),
            },
            Ok(Ok(None)) => return Err(DasaError::kernel_start_failed("kernel exited before becoming ready")),
            Ok(Err(e)) => return Err(DasaError::kernel_start_failed(e.to_string())),
            Err(_) => return Err(DasaError::kernel_start_failed("kernel did not signal readiness in time")),
        }

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.reader = Some(lines);
        self.phase = SessionPhase::Ready;
        tracing::info!(command = %self.command, "interpreter session ready");
        Ok(())
    }

    async fn do_execute(
        &mut self,
        source: &str,
        timeout: Duration,
        mut on_chunk: Option<Box<dyn FnMut(bool, &str) + Send + '_>>,
    ) -> Result<ExecutionResult, DasaError> {
        if self.phase != SessionPhase::Ready {
            return Err(DasaError::transport("session is not ready for execution"));
        }
        let id = self.next_submission_id();
        let stdin = self.stdin.as_mut().ok_or_else(|| DasaError::transport("no stdin handle"))?;
        let line = encode_submission(&Submission {
            id: id.clone(),
            code: source.to_string(),
        });
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| DasaError::transport(e.to_string()))?;

        self.phase = SessionPhase::Executing;
        let start = Instant::now();
        let mut result = ExecutionResult {
            success: true,
            ..Default::default()
        };

        let outcome = tokio::time::timeout(timeout, async {
            loop {
                let reader = self
                    .reader
                    .as_mut()
                    .ok_or_else(|| DasaError::transport("no stdout handle"))?;
                let Some(line) = reader.next_line().await.map_err(|e| DasaError::transport(e.to_string()))? else {
                    return Err(DasaError::transport("interpreter subprocess closed its output"));
                };
                let Some(msg) = decode_message(&line) else {
                    continue;
                };
                match msg {
                    KernelMessage::Stream { id: mid, name, text } if mid == id => {
                        if let Some(cb) = on_chunk.as_mut() {
                            cb(name == StreamName::Stdout, &text);
                        }
                        match name {
                            StreamName::Stdout => result.stdout.push_str(&text),
                            StreamName::Stderr => result.stderr.push_str(&text),
                        }
                    }
                    KernelMessage::ExecuteResult { id: mid, data } | KernelMessage::DisplayData { id: mid, data } if mid == id => {
                        if result.display_value.is_none() {
                            result.display_value = Some(data);
                        }
                    }
                    KernelMessage::Error {
                        id: mid,
                        ename,
                        evalue,
                        traceback,
                    } if mid == id => {
                        result.success = false;
                        result.error_kind = Some(ename);
                        result.error_message = Some(evalue);
                        result.traceback_frames = traceback;
                    }
                    KernelMessage::Status { id: mid, state: ExecutionState::Idle } if mid == id => {
                        break;
                    }
                    _ => {}
                }
            }
            Ok(())
        })
        .await;

        result.wall_time_seconds = start.elapsed().as_secs_f64();
        self.phase = SessionPhase::Ready;

        match outcome {
            Ok(Ok(())) => Ok(result),
            Ok(Err(e)) => {
                self.phase = SessionPhase::Shutdown;
                Err(e)
            }
            Err(_) => Ok(ExecutionResult::timeout(timeout.as_secs_f64())),
        }
    }

    async fn do_interrupt(&mut self) -> Result<(), DasaError> {
        let Some(child) = self.child.as_ref() else {
            return Ok(());
        };
        let Some(pid) = child.id() else {
            return Ok(());
        };
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(|e| DasaError::transport(e.to_string()))?;
            Ok(())
        }
        #[cfg(not(unix))]
        {
            Err(DasaError::transport("interrupt is not supported on this platform"))
        }
    }

    async fn do_restart(&mut self) -> Result<(), DasaError> {
        self.do_shutdown().await?;
        self.do_start().await
    }

    async fn do_shutdown(&mut self) -> Result<(), DasaError> {
        if self.phase == SessionPhase::Shutdown || self.phase == SessionPhase::NotStarted {
            self.phase = SessionPhase::Shutdown;
            return Ok(());
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self.stdin = None;
        self.reader = None;
        self.phase = SessionPhase::Shutdown;
        Ok(())
    }
}

impl InterpreterSession for SubprocessSession {
    fn start(&mut self) -> BoxFuture<'_, Result<(), DasaError>> {
        Box::pin(self.do_start())
    }

    fn execute(&mut self, source: &str, timeout: Duration) -> BoxFuture<'_, Result<ExecutionResult, DasaError>> {
        let source = source.to_string();
        Box::pin(async move { self.do_execute(&source, timeout, None).await })
    }

    fn execute_streaming(
        &mut self,
        source: &str,
        timeout: Duration,
        on_chunk: Box<dyn FnMut(bool, &str) + Send + '_>,
    ) -> BoxFuture<'_, Result<ExecutionResult, DasaError>> {
        let source = source.to_string();
        Box::pin(async move { self.do_execute(&source, timeout, Some(on_chunk)).await })
    }

    fn interrupt(&mut self) -> BoxFuture<'_, Result<(), DasaError>> {
        Box::pin(self.do_interrupt())
    }

    fn restart(&mut self) -> BoxFuture<'_, Result<(), DasaError>> {
        Box::pin(self.do_restart())
    }

    fn shutdown(&mut self) -> BoxFuture<'_, Result<(), DasaError>> {
        Box::pin(self.do_shutdown())
    }

    fn phase(&self) -> SessionPhase {
        self.phase
    }
}
