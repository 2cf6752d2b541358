//! kardex-check - Validate a movements file against the valuation rules.
//!
//! Every movement is posted to a fresh engine; unreadable rows and
//! movements the engine refuses are reported. Exits with 0 when the file
//! is clean, 1 when something was reported and 2 on fatal errors.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use super::{init_logging, EngineArgs, OutputFormat};
use crate::{ingest, load, report};

/// Validate a movements file and report problems.
#[derive(Parser, Debug)]
#[command(name = "kardex-check")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Movements file (CSV, or JSON with a .json extension)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Show verbose output including timing information
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output (just use exit code)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// A reported problem in JSON output.
#[derive(Debug, Serialize)]
pub struct JsonProblem {
    /// "row" for unreadable rows, "movement" for refused movements
    pub kind: &'static str,
    /// Stream of the refused movement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    /// Timestamp of the refused movement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// What went wrong
    pub message: String,
    /// Whether retrying the same call could succeed
    pub retryable: bool,
}

/// JSON output structure for a check run.
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    /// Reported problems
    pub problems: Vec<JsonProblem>,
    /// Movements read from the file
    pub movement_count: usize,
    /// Movements posted
    pub accepted_count: usize,
    /// Streams found
    pub stream_count: usize,
}

fn run(args: &Args) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    let start = std::time::Instant::now();

    if !args.file.exists() {
        anyhow::bail!("file not found: {}", args.file.display());
    }

    let engine = args.engine.engine()?;
    let loaded = load::load_file(&args.file)?;
    let movement_count = loaded.movements.len();
    let warnings = loaded.warnings;

    let outcome = ingest::ingest(&engine, loaded.movements);
    let stream_count = engine.streams().len();
    info!(
        movements = movement_count,
        accepted = outcome.accepted,
        streams = stream_count,
        elapsed_ms = start.elapsed().as_millis(),
        "check finished"
    );

    let problem_count = warnings.len() + outcome.rejected.len();

    if args.quiet {
        return Ok(exit_code(problem_count));
    }

    if matches!(args.format, OutputFormat::Json) {
        let problems = warnings
            .iter()
            .map(|w| JsonProblem {
                kind: "row",
                stream: None,
                timestamp: None,
                message: w.clone(),
                retryable: false,
            })
            .chain(outcome.rejected.iter().map(|r| JsonProblem {
                kind: "movement",
                stream: Some(r.event.stream_id().to_string()),
                timestamp: Some(r.event.timestamp.to_string()),
                message: r.error.to_string(),
                retryable: r.error.is_retryable(),
            }))
            .collect();
        let output = JsonOutput {
            problems,
            movement_count,
            accepted_count: outcome.accepted,
            stream_count,
        };
        serde_json::to_writer_pretty(&mut stdout, &output)?;
        writeln!(stdout)?;
    } else {
        for warning in &warnings {
            writeln!(stdout, "{warning}")?;
        }
        report::write_rejections(&mut stdout, &outcome.rejected)?;

        if args.verbose {
            writeln!(
                stdout,
                "{movement_count} movements, {} accepted, {stream_count} streams in {:.2?}",
                outcome.accepted,
                start.elapsed()
            )?;
        }
        if problem_count > 0 {
            writeln!(stdout, "{problem_count} problem(s) found")?;
        }
    }

    Ok(exit_code(problem_count))
}

fn exit_code(problem_count: usize) -> ExitCode {
    if problem_count == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Main entry point for the check command.
pub fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose);

    match run(&args) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
