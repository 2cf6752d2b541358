//! Command implementations for CLI tools.
//!
//! Each module contains the full implementation for a command,
//! which can be invoked by thin wrapper binaries.

pub mod check;
pub mod report_cmd;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use kardex_core::{NegativeStockPolicy, ValuationMethod};
use kardex_engine::{EngineConfig, ValuationEngine};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON output for tooling integration
    Json,
}

/// Engine options shared by every command.
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Engine configuration file (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Valuation method for items the configuration does not list
    /// (FIFO, LIFO or AVERAGE)
    #[arg(short, long, value_name = "METHOD", global = true)]
    pub method: Option<ValuationMethod>,

    /// Record issues beyond the balance instead of rejecting them
    #[arg(long, global = true)]
    pub allow_negative: bool,
}

impl EngineArgs {
    /// Build the engine configuration: the file if given, then overrides.
    pub fn config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(method) = self.method {
            config = config.with_default_method(method);
        }
        if self.allow_negative {
            config = config.with_negative_stock(NegativeStockPolicy::Allow);
        }
        Ok(config)
    }

    /// Build an engine from [`EngineArgs::config`].
    pub fn engine(&self) -> Result<ValuationEngine> {
        Ok(ValuationEngine::with_config(self.config()?))
    }
}

/// Install the log subscriber on stderr.
///
/// `--verbose` logs at debug level with span timings; otherwise `RUST_LOG`
/// decides.
pub fn init_logging(verbose: bool) {
    let builder = tracing_subscriber::fmt().with_writer(std::io::stderr);
    if verbose {
        builder
            .with_max_level(Level::DEBUG)
            .with_span_events(FmtSpan::CLOSE)
            .init();
    } else {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    }
}
