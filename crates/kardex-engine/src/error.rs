//! Engine error taxonomy.

use chrono::NaiveDateTime;
use kardex_core::{Sequence, StockError, StreamId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors returned by the valuation engine.
///
/// Every error is returned before any state is committed: a failed call
/// leaves the stream's cost layers and ledger exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An outflow exceeds the balance under a rejecting policy.
    #[error("insufficient stock for {stream}: requested {requested}, available {available}")]
    InsufficientStock {
        /// The stream being drawn from.
        stream: StreamId,
        /// Quantity requested.
        requested: Decimal,
        /// Quantity on hand.
        available: Decimal,
    },

    /// Malformed movement.
    #[error("invalid movement: {0}")]
    InvalidMovement(String),

    /// A movement precedes the stream's latest entry but was not submitted
    /// through the back-dated insert path.
    #[error(
        "out-of-order movement for {stream}: {timestamp} precedes {latest}; use a back-dated insert"
    )]
    OutOfOrderEvent {
        /// The stream.
        stream: StreamId,
        /// Timestamp of the rejected movement.
        timestamp: NaiveDateTime,
        /// Timestamp of the stream's latest entry.
        latest: NaiveDateTime,
    },

    /// A recompute is running for the stream. Retry after a short backoff.
    #[error("recompute in progress for {stream}")]
    RecomputeInProgress {
        /// The stream.
        stream: StreamId,
    },

    /// No movement has ever been recorded for the stream.
    #[error("unknown stream: {0}")]
    UnknownStream(StreamId),

    /// The stream has no movement with this sequence.
    #[error("unknown sequence {sequence} in {stream}")]
    UnknownSequence {
        /// The stream.
        stream: StreamId,
        /// The requested sequence.
        sequence: Sequence,
    },

    /// A period whose start is after its end.
    #[error("invalid period: {from} is after {to}")]
    InvalidPeriod {
        /// Window start.
        from: NaiveDateTime,
        /// Window end.
        to: NaiveDateTime,
    },
}

impl EngineError {
    /// Attach a stream to a cost layer store error.
    #[must_use]
    pub fn from_stock(stream: &StreamId, error: StockError) -> Self {
        match error {
            StockError::InsufficientStock {
                requested,
                available,
            } => Self::InsufficientStock {
                stream: stream.clone(),
                requested,
                available,
            },
            StockError::InvalidMovement(message) => Self::InvalidMovement(message),
        }
    }

    /// Check if the caller should retry the same call.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RecomputeInProgress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_stock_keeps_quantities() {
        let stream = StreamId::new("milk", "bar");
        let err = EngineError::from_stock(
            &stream,
            StockError::InsufficientStock {
                requested: dec!(3),
                available: dec!(1),
            },
        );

        assert_eq!(
            err.to_string(),
            "insufficient stock for milk@bar: requested 3, available 1"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_only_recompute_is_retryable() {
        let err = EngineError::RecomputeInProgress {
            stream: StreamId::new("a", "b"),
        };
        assert!(err.is_retryable());
        assert!(!EngineError::InvalidMovement("x".into()).is_retryable());
    }
}
