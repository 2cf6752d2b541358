//! Errors raised by the cost layer store and movement validation.

use rust_decimal::Decimal;
use thiserror::Error;

/// Error that can occur while applying a movement to a cost layer store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    /// An outflow exceeds the balance under a rejecting policy.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// Quantity requested by the outflow.
        requested: Decimal,
        /// Quantity on hand before the outflow.
        available: Decimal,
    },

    /// The movement is malformed and was not applied.
    #[error("invalid movement: {0}")]
    InvalidMovement(String),
}
