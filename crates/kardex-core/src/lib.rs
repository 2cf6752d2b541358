//! Core types for kardex
//!
//! This crate provides the fundamental types of the stock valuation engine:
//!
//! - [`MovementEvent`] - One physical stock change for one item in one warehouse
//! - [`MovementKind`] - What kind of change, and which way stock moves
//! - [`CostLayer`] - A still-unconsumed inflow held at its unit cost
//! - [`CostLayerStore`] - Per-stream cost state with FIFO/LIFO/average support
//! - [`ValuationMethod`] - Which cost leaves with an outflow
//! - [`LedgerEntry`] - One line of the kardex with running balance and value
//! - [`PeriodSummary`] - Opening/closing balances and flows over a window
//!
//! # Example
//!
//! ```
//! use kardex_core::{CostLayer, CostLayerStore, NegativeStockPolicy, ValuationMethod};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let at = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0).unwrap();
//!
//! // Moving-average store
//! let mut store = CostLayerStore::new(ValuationMethod::WeightedAverage);
//! store.apply_inflow(CostLayer::new(dec!(5), dec!(1000), at)).unwrap();
//! store.apply_inflow(CostLayer::new(dec!(5), dec!(1200), at)).unwrap();
//! assert_eq!(store.average_cost(), dec!(1100));
//!
//! // Issue 8 units at the moving average
//! let used = store.apply_outflow(dec!(8), NegativeStockPolicy::Reject).unwrap();
//! assert_eq!(used.total_cost, dec!(8800));
//! assert_eq!(store.current_balance(), dec!(2));
//! assert_eq!(store.current_value(), dec!(2200));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cost;
pub mod entry;
pub mod error;
pub mod layers;
pub mod method;
pub mod movement;

pub use cost::{ConsumedLayer, CostLayer};
pub use entry::{LedgerEntry, PeriodSummary, StockPosition};
pub use error::StockError;
pub use layers::{Consumption, CostLayerStore, Intake};
pub use method::{NegativeStockPolicy, ValuationMethod};
pub use movement::{
    Direction, DocumentType, MovementEvent, MovementKind, Sequence, StreamId, UnknownMovementKind,
};

// Re-export commonly used external types
pub use chrono::{NaiveDate, NaiveDateTime};
pub use rust_decimal::Decimal;
