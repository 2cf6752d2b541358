//! Inventory valuation engine.
//!
//! This crate turns ordered movement events into a kardex: one ledger per
//! (item, warehouse) stream, each entry carrying the running balance, the
//! running value and the cost that left with it.
//!
//! - [`ValuationEngine`] - Concurrent entry point, one lock per stream
//! - [`Stream`] - Movements, cost layers, ledger and checkpoints of one stream
//! - [`Ledger`] - Ordered entries with time lookups
//! - [`summarize`] - Period summaries over a ledger window
//! - [`ItemRegistry`] - Where each item's method and negative stock policy come from
//! - [`EngineConfig`] - Defaults for items the registry does not know
//!
//! # Back-dated corrections
//!
//! Movements arriving in timestamp order are appended. A movement dated
//! before the stream's latest entry is rejected with
//! [`EngineError::OutOfOrderEvent`] unless it goes through
//! [`ValuationEngine::insert_backdated`], which replays every later entry
//! from the nearest checkpoint.
//!
//! ```
//! use kardex_engine::{EngineConfig, ValuationEngine};
//! use kardex_core::{MovementEvent, MovementKind, StreamId, ValuationMethod};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let engine = ValuationEngine::with_config(
//!     EngineConfig::default().with_default_method(ValuationMethod::Fifo),
//! );
//! let stream = StreamId::new("rice", "store");
//! let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_hms_opt(9, 0, 0).unwrap();
//!
//! engine.record_movement(&stream,
//!     MovementEvent::new("rice", "store", day(1), MovementKind::Receipt, dec!(10))
//!         .with_unit_cost(dec!(2))).unwrap();
//! engine.record_movement(&stream,
//!     MovementEvent::new("rice", "store", day(5), MovementKind::Issue, dec!(15))).unwrap_err();
//!
//! engine.insert_backdated(&stream,
//!     MovementEvent::new("rice", "store", day(3), MovementKind::Receipt, dec!(10))
//!         .with_unit_cost(dec!(3))).unwrap();
//! let issue = engine.record_movement(&stream,
//!     MovementEvent::new("rice", "store", day(5), MovementKind::Issue, dec!(15))).unwrap();
//!
//! assert_eq!(issue.total_value, dec!(35));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod stream;
pub mod summary;

pub use config::{ConfigError, EngineConfig, ItemSettings, DEFAULT_CHECKPOINT_INTERVAL};
pub use engine::ValuationEngine;
pub use error::EngineError;
pub use ledger::Ledger;
pub use registry::{InMemoryRegistry, ItemRegistry};
pub use stream::{RecordedMovement, Stream, StreamState};
pub use summary::summarize;
