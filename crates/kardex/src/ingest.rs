//! Feeding loaded movements into a valuation engine.
//!
//! Movements are grouped by stream and each stream is posted in timestamp
//! order (file order breaks ties). Streams share no state, so they are
//! posted in parallel.

use kardex_core::{MovementEvent, MovementKind, StreamId};
use kardex_engine::{EngineError, ValuationEngine};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info_span};

/// A movement the engine refused.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// The refused movement.
    pub event: MovementEvent,
    /// Why it was refused.
    pub error: EngineError,
}

/// Outcome of an ingest run.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Movements posted to a ledger.
    pub accepted: usize,
    /// Physical counts that matched the book balance.
    pub counts_matched: usize,
    /// Refused movements, grouped by stream.
    pub rejected: Vec<Rejection>,
}

impl IngestReport {
    fn merge(mut self, other: Self) -> Self {
        self.accepted += other.accepted;
        self.counts_matched += other.counts_matched;
        self.rejected.extend(other.rejected);
        self
    }

    /// Check if every movement was accepted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Post `movements` to `engine`.
pub fn ingest(engine: &ValuationEngine, movements: Vec<MovementEvent>) -> IngestReport {
    let mut by_stream: BTreeMap<StreamId, Vec<MovementEvent>> = BTreeMap::new();
    for event in movements {
        by_stream.entry(event.stream_id()).or_default().push(event);
    }

    let reports: Vec<IngestReport> = by_stream
        .into_par_iter()
        .map(|(stream, mut events)| {
            events.sort_by_key(|e| e.timestamp);
            ingest_stream(engine, &stream, events)
        })
        .collect();

    reports
        .into_iter()
        .fold(IngestReport::default(), IngestReport::merge)
}

fn ingest_stream(
    engine: &ValuationEngine,
    stream: &StreamId,
    events: Vec<MovementEvent>,
) -> IngestReport {
    let _span = info_span!("ingest", stream = %stream, movements = events.len()).entered();
    let mut report = IngestReport::default();

    for event in events {
        let result = if event.kind == MovementKind::PhysicalCount {
            match engine.reconcile_count(stream, &event) {
                Ok(Some(adjustment)) => engine.record_movement(stream, adjustment).map(|_| ()),
                Ok(None) => {
                    report.counts_matched += 1;
                    debug!(timestamp = %event.timestamp, "count matches book balance");
                    continue;
                }
                Err(e) => Err(e),
            }
        } else {
            engine.record_movement(stream, event.clone()).map(|_| ())
        };

        match result {
            Ok(()) => report.accepted += 1,
            Err(error) => report.rejected.push(Rejection { event, error }),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kardex_engine::EngineConfig;
    use rust_decimal_macros::dec;

    fn at(day: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_streams_are_sorted_and_counted() {
        let engine = ValuationEngine::with_config(EngineConfig::default());
        let movements = vec![
            MovementEvent::new("a", "w", at(3), MovementKind::Issue, dec!(4)),
            MovementEvent::new("a", "w", at(1), MovementKind::Receipt, dec!(10))
                .with_unit_cost(dec!(2)),
            MovementEvent::new("b", "w", at(1), MovementKind::Issue, dec!(1)),
            MovementEvent::new("a", "w", at(4), MovementKind::PhysicalCount, dec!(6)),
            MovementEvent::new("a", "w", at(5), MovementKind::PhysicalCount, dec!(5)),
        ];

        let report = ingest(&engine, movements);

        assert_eq!(report.accepted, 3);
        assert_eq!(report.counts_matched, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].event.item_id, "b");
        assert!(matches!(
            report.rejected[0].error,
            EngineError::InsufficientStock { .. }
        ));
        assert_eq!(
            engine.current_position(&StreamId::new("a", "w")).balance,
            dec!(5)
        );
    }
}
