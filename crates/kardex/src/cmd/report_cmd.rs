//! kardex-report - Print kardex reports from a movements file.
//!
//! # Usage
//!
//! ```bash
//! kardex-report movements.csv ledger --item flour
//! kardex-report movements.csv summary --from 2024-01-01 --to 2024-01-31
//! kardex-report movements.csv layers --expiring 2024-03-01
//! kardex-report movements.csv recost --item flour --warehouse main --to-method FIFO
//! ```
//!
//! # Reports
//!
//! - `ledger` - Every entry with running balance and value
//! - `summary` - Opening, flows and closing over a period
//! - `layers` - Active cost layers, optionally only those expiring soon
//! - `recost` - Re-value one stream under another method

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use kardex_core::{CostLayer, LedgerEntry, PeriodSummary, StreamId, ValuationMethod};
use kardex_engine::ValuationEngine;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use super::{init_logging, EngineArgs, OutputFormat};
use crate::{ingest, load, report};

/// Generate kardex reports from a movements file.
#[derive(Parser, Debug)]
#[command(name = "kardex-report")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Movements file (CSV, or JSON with a .json extension)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// The report to generate
    #[command(subcommand)]
    report: Report,

    #[command(flatten)]
    engine: EngineArgs,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Report {
    /// Show the kardex of each stream
    Ledger {
        #[command(flatten)]
        filter: StreamFilter,
        /// Only entries at or after this date or timestamp
        #[arg(long, value_parser = parse_start)]
        from: Option<NaiveDateTime>,
        /// Only entries at or before this date or timestamp
        #[arg(long, value_parser = parse_end)]
        to: Option<NaiveDateTime>,
    },
    /// Show a period summary of each stream
    Summary {
        #[command(flatten)]
        filter: StreamFilter,
        /// Period start (inclusive)
        #[arg(long, value_parser = parse_start)]
        from: NaiveDateTime,
        /// Period end (inclusive)
        #[arg(long, value_parser = parse_end)]
        to: NaiveDateTime,
        /// Add up warehouses per item
        #[arg(long)]
        by_item: bool,
    },
    /// Show active cost layers
    Layers {
        #[command(flatten)]
        filter: StreamFilter,
        /// Only layers expiring on or before this date
        #[arg(long, value_name = "DATE")]
        expiring: Option<NaiveDate>,
    },
    /// Re-value one stream under another method and show its kardex
    Recost {
        /// Item to re-value
        #[arg(short, long)]
        item: String,
        /// Warehouse to re-value
        #[arg(short, long)]
        warehouse: String,
        /// Target method (FIFO, LIFO or AVERAGE)
        #[arg(long, value_name = "METHOD")]
        to_method: ValuationMethod,
    },
}

#[derive(clap::Args, Debug)]
struct StreamFilter {
    /// Only this item
    #[arg(short, long)]
    item: Option<String>,
    /// Only this warehouse
    #[arg(short, long)]
    warehouse: Option<String>,
}

impl StreamFilter {
    fn matches(&self, stream: &StreamId) -> bool {
        self.item.as_ref().map_or(true, |i| *i == stream.item_id)
            && self
                .warehouse
                .as_ref()
                .map_or(true, |w| *w == stream.warehouse_id)
    }

    fn select(&self, engine: &ValuationEngine) -> Vec<StreamId> {
        engine
            .streams()
            .into_iter()
            .filter(|s| self.matches(s))
            .collect()
    }
}

fn parse_start(s: &str) -> Result<NaiveDateTime, String> {
    load::parse_timestamp(s).ok_or_else(|| format!("invalid date or timestamp: {s}"))
}

fn parse_end(s: &str) -> Result<NaiveDateTime, String> {
    load::parse_window_end(s).ok_or_else(|| format!("invalid date or timestamp: {s}"))
}

#[derive(Serialize)]
struct StreamLedger<'a> {
    stream: &'a StreamId,
    unit: Option<String>,
    entries: Vec<LedgerEntry>,
}

#[derive(Serialize)]
struct NamedSummary {
    name: String,
    unit: Option<String>,
    summary: PeriodSummary,
}

#[derive(Serialize)]
struct StreamLayers<'a> {
    stream: &'a StreamId,
    layers: Vec<CostLayer>,
}

/// Main entry point for the report command.
pub fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut stdout = io::stdout().lock();

    if !args.file.exists() {
        anyhow::bail!("file not found: {}", args.file.display());
    }

    let engine = args.engine.engine()?;
    let loaded = load::load_file(&args.file)?;
    for warning in &loaded.warnings {
        eprintln!("warning: {warning}");
    }

    let outcome = ingest::ingest(&engine, loaded.movements);
    if !outcome.is_clean() {
        eprintln!("warning: {} movement(s) rejected", outcome.rejected.len());
        report::write_rejections(&mut io::stderr().lock(), &outcome.rejected)?;
    }

    let json = matches!(args.format, OutputFormat::Json);

    match &args.report {
        Report::Ledger { filter, from, to } => {
            let streams = filter.select(&engine);
            report_ledgers(&engine, &streams, *from, *to, json, &mut stdout)?;
        }
        Report::Summary {
            filter,
            from,
            to,
            by_item,
        } => {
            let summaries = if *by_item {
                item_summaries(&engine, filter, *from, *to)?
            } else {
                stream_summaries(&engine, filter, *from, *to)?
            };
            if json {
                serde_json::to_writer_pretty(&mut stdout, &summaries)?;
                writeln!(stdout)?;
            } else {
                for s in &summaries {
                    report::write_summary(&mut stdout, &s.name, &s.summary, s.unit.as_deref())?;
                    writeln!(stdout)?;
                }
            }
        }
        Report::Layers { filter, expiring } => {
            let streams = filter.select(&engine);
            let layers: Vec<StreamLayers<'_>> = streams
                .iter()
                .map(|stream| StreamLayers {
                    stream,
                    layers: match expiring {
                        Some(date) => engine.expiring_layers(stream, *date),
                        None => engine.cost_layers(stream),
                    },
                })
                .collect();
            if json {
                serde_json::to_writer_pretty(&mut stdout, &layers)?;
                writeln!(stdout)?;
            } else {
                for l in &layers {
                    report::write_layers(&mut stdout, l.stream, &l.layers)?;
                    writeln!(stdout)?;
                }
            }
        }
        Report::Recost {
            item,
            warehouse,
            to_method,
        } => {
            let stream = StreamId::new(item.as_str(), warehouse.as_str());
            engine
                .recost_item(&stream, *to_method)
                .with_context(|| format!("failed to recost {stream}"))?;
            report_ledgers(&engine, &[stream], None, None, json, &mut stdout)?;
        }
    }

    Ok(())
}

fn report_ledgers<W: Write>(
    engine: &ValuationEngine,
    streams: &[StreamId],
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
    json: bool,
    writer: &mut W,
) -> Result<()> {
    let ledgers: Vec<StreamLedger<'_>> = streams
        .iter()
        .map(|stream| StreamLedger {
            stream,
            unit: engine.unit(&stream.item_id),
            entries: engine.get_ledger(stream, from, to),
        })
        .collect();

    if json {
        serde_json::to_writer_pretty(&mut *writer, &ledgers)?;
        writeln!(writer)?;
    } else {
        for l in &ledgers {
            report::write_ledger(writer, l.stream, &l.entries, l.unit.as_deref())?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn stream_summaries(
    engine: &ValuationEngine,
    filter: &StreamFilter,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<NamedSummary>> {
    filter
        .select(engine)
        .into_iter()
        .map(|stream| {
            Ok(NamedSummary {
                name: format!("Summary {stream}"),
                unit: engine.unit(&stream.item_id),
                summary: engine.get_summary(&stream, from, to)?,
            })
        })
        .collect()
}

fn item_summaries(
    engine: &ValuationEngine,
    filter: &StreamFilter,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<NamedSummary>> {
    let mut items: Vec<String> = filter
        .select(engine)
        .into_iter()
        .map(|s| s.item_id)
        .collect();
    items.dedup();

    items
        .into_iter()
        .map(|item| {
            Ok(NamedSummary {
                name: format!("Summary {item} (all warehouses)"),
                unit: engine.unit(&item),
                summary: engine.summarize_item(&item, from, to)?,
            })
        })
        .collect()
}
