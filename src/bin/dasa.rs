//! Minimal CLI entry point (§4.13): one subcommand per Command Orchestrator
//! operation. Owns argument parsing, `tracing` init, and result formatting
//! only — no analysis logic lives here.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dasa::error::DasaError;
use dasa::interpreter::session::SubprocessSession;
use dasa::interpreter::InterpreterSession;
use dasa::orchestrator::{CellSelector, CommandOrchestrator};
use dasa::paths;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "dasa")]
#[command(author, version, about = "Notebook-aware developer toolkit for agent-driven data science", long_about = None)]
struct Cli {
    /// Output format for command results
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile a notebook variable or a standalone delimited-text file
    Profile {
        /// Notebook to load (required unless --file is given)
        #[arg(long)]
        notebook: Option<PathBuf>,
        /// Variable name to profile inside the notebook's interpreter
        #[arg(long)]
        var: Option<String>,
        /// Offline delimited-text file to profile instead of a live variable
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Report the State Analyzer's consistency report for a notebook
    Check {
        notebook: PathBuf,
        /// Report the downstream impact of this cell index
        #[arg(long)]
        cell: Option<usize>,
        /// Auto-repair never-executed and stale cells
        #[arg(long)]
        fix: bool,
    },

    /// Execute one or more cells of a notebook
    Run {
        notebook: PathBuf,
        /// Single cell index to run
        #[arg(long)]
        cell: Option<usize>,
        /// Run all cells from this index to the end
        #[arg(long)]
        from: Option<usize>,
        /// Run all cells up to and including this index
        #[arg(long)]
        to: Option<usize>,
        /// Run all code cells
        #[arg(long)]
        all: bool,
        /// Run only never-executed or stale cells
        #[arg(long)]
        stale_only: bool,
        /// Per-cell execution timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// Interpreter command to launch (defaults to `python3 -u -m dasa.kernel`)
        #[arg(long, default_value = "python3")]
        interpreter: String,
    },

    /// Read or write the project context and decision log
    Context {
        /// Write a new goal instead of reading
        #[arg(long)]
        goal: Option<String>,
        /// Write a new status instead of reading
        #[arg(long)]
        status: Option<String>,
        /// Show the last N decision-log lines
        #[arg(long, default_value_t = 10)]
        log: usize,
    },

    /// Cold re-execute a notebook and score reproducibility
    Replay {
        notebook: PathBuf,
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        #[arg(long, default_value = "python3")]
        interpreter: String,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn metadata_dir() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_default();
    paths::metadata_dir(&cwd)
}

fn print_error(err: &DasaError, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "error": err.kind_name(),
                "message": err.message,
                "help": err.help,
            });
            eprintln!("{body}");
        }
        OutputFormat::Text => eprintln!("{}", err.formatted_message()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("dasa: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let orchestrator = CommandOrchestrator::new(metadata_dir());
    let format = cli.format;

    match cli.command {
        Commands::Profile { notebook, var, file } => {
            if let Some(file) = file {
                match orchestrator.profile_file(&file) {
                    Ok(profile) => {
                        emit(&profile, format);
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(e) => {
                        print_error(&e, format);
                        Ok(ExitCode::FAILURE)
                    }
                }
            } else {
                let Some(notebook) = notebook else {
                    eprintln!("dasa: profile requires either --file or --notebook with --var");
                    return Ok(ExitCode::FAILURE);
                };
                let Some(var) = var else {
                    eprintln!("dasa: profile --notebook requires --var");
                    return Ok(ExitCode::FAILURE);
                };
                let mut session = SubprocessSession::new("python3", Vec::new());
                session.start().await.ok();
                match orchestrator.profile_variable(&mut session, &notebook, &var).await {
                    Ok(profile) => {
                        emit(&profile, format);
                        session.shutdown().await.ok();
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(e) => {
                        print_error(&e, format);
                        session.shutdown().await.ok();
                        Ok(ExitCode::FAILURE)
                    }
                }
            }
        }

        Commands::Check { notebook, cell, fix } => {
            if fix {
                let mut session = SubprocessSession::new("python3", Vec::new());
                match orchestrator.check_fix(&mut session, &notebook, Duration::from_secs(300)).await {
                    Ok(results) => {
                        let failed = results.iter().any(|r| !r.success);
                        emit(&results.iter().map(cell_result_json).collect::<Vec<_>>(), format);
                        session.shutdown().await.ok();
                        Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
                    }
                    Err(e) => {
                        print_error(&e, format);
                        session.shutdown().await.ok();
                        Ok(ExitCode::FAILURE)
                    }
                }
            } else {
                match orchestrator.check(&notebook) {
                    Ok(report) => {
                        let consistent = report.consistent;
                        if let Some(cell) = cell {
                            let impact = orchestrator.check_impact(&notebook, cell)?;
                            emit(&serde_json::json!({"report": report_json(&report), "impact": impact}), format);
                        } else {
                            emit(&report_json(&report), format);
                        }
                        Ok(if consistent { ExitCode::SUCCESS } else { ExitCode::FAILURE })
                    }
                    Err(e) => {
                        print_error(&e, format);
                        Ok(ExitCode::FAILURE)
                    }
                }
            }
        }

        Commands::Run {
            notebook,
            cell,
            from,
            to,
            all,
            stale_only,
            timeout,
            interpreter,
        } => {
            let selector = if let Some(i) = cell {
                CellSelector::Single(i)
            } else if let Some(i) = from {
                CellSelector::From(i)
            } else if let Some(i) = to {
                CellSelector::To(i)
            } else if stale_only {
                CellSelector::StaleOnly
            } else if all {
                CellSelector::All
            } else {
                CellSelector::All
            };

            let mut session = SubprocessSession::new(interpreter, Vec::new());
            match orchestrator.run(&mut session, &notebook, selector, Duration::from_secs(timeout)).await {
                Ok(results) => {
                    let failed = results.iter().any(|r| !r.success);
                    emit(&results.iter().map(cell_result_json).collect::<Vec<_>>(), format);
                    session.shutdown().await.ok();
                    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
                }
                Err(e) => {
                    print_error(&e, format);
                    session.shutdown().await.ok();
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Context { goal, status, log } => {
            if goal.is_some() || status.is_some() {
                let mut context = orchestrator.context_read();
                if let Some(goal) = goal {
                    context.goal = Some(goal);
                }
                if let Some(status) = status {
                    context.status = Some(status);
                }
                match orchestrator.context_write(&context) {
                    Ok(()) => {
                        emit(&serde_json::json!({"written": true}), format);
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(e) => {
                        print_error(&e, format);
                        Ok(ExitCode::FAILURE)
                    }
                }
            } else {
                let context = orchestrator.context_read();
                let lines = orchestrator.context_log(log);
                emit(&serde_json::json!({"context": context, "log": lines}), format);
                Ok(ExitCode::SUCCESS)
            }
        }

        Commands::Replay { notebook, timeout, interpreter } => {
            let mut session = SubprocessSession::new(interpreter, Vec::new());
            match orchestrator.replay(&mut session, &notebook, Duration::from_secs(timeout)).await {
                Ok(summary) => {
                    let failed = summary.reproducibility_score < 1.0;
                    emit(
                        &serde_json::json!({
                            "total_cells": summary.total_cells,
                            "executed": summary.executed,
                            "reproduced": summary.reproduced,
                            "reproducibility_score": summary.reproducibility_score,
                            "total_time": summary.total_time_seconds,
                        }),
                        format,
                    );
                    session.shutdown().await.ok();
                    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
                }
                Err(e) => {
                    print_error(&e, format);
                    session.shutdown().await.ok();
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Both formats render as pretty JSON for now — rich text rendering is the
/// external terminal-UI collaborator's job (§1), not this thin binary's.
fn emit<T: serde::Serialize>(value: &T, _format: OutputFormat) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn report_json(report: &dasa::state::StateReport) -> serde_json::Value {
    serde_json::json!({
        "consistent": report.consistent,
        "issues": report.issues.iter().map(|i| serde_json::json!({
            "cell_index": i.cell_index,
            "severity": format!("{:?}", i.severity),
            "message": i.message,
            "suggestion": i.suggestion,
        })).collect::<Vec<_>>(),
        "execution_order": report.execution_order,
        "canonical_order": report.canonical_order,
    })
}

fn cell_result_json(result: &dasa::orchestrator::CellRunResult) -> serde_json::Value {
    serde_json::json!({
        "index": result.index,
        "success": result.success,
        "wall_time": result.wall_time_seconds,
        "stdout": result.stdout,
        "display_value": result.display_value,
        "stale_downstream": result.stale_downstream,
    })
}
