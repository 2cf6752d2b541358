//! Kardex command-line tools.
//!
//! This crate provides command-line tools for working with stock movement
//! files:
//!
//! - `kardex-check`: Post every movement and report the ones refused
//! - `kardex-report`: Print ledgers, period summaries and cost layers
//!
//! # Example Usage
//!
//! ```bash
//! kardex-check movements.csv
//! kardex-report movements.csv --method FIFO ledger --item flour
//! kardex-report movements.json summary --from 2024-01-01 --to 2024-01-31 --by-item
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod ingest;
pub mod load;
pub mod report;
