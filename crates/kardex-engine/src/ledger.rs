//! Append-only, ordered ledger of one stream.

use chrono::NaiveDateTime;
use kardex_core::{LedgerEntry, StockPosition};

/// Ordered ledger entries of one stream.
///
/// Entries are kept in `(timestamp, sequence)` order, so time lookups are
/// binary searches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, in stream order.
    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the ledger has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The latest entry.
    #[must_use]
    pub fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    /// Add an entry at the tail.
    pub fn append(&mut self, entry: LedgerEntry) {
        debug_assert!(self
            .entries
            .last()
            .map_or(true, |last| last.order_key() < entry.order_key()));
        self.entries.push(entry);
    }

    /// Remove every entry at or after `position`.
    pub fn truncate_from(&mut self, position: usize) {
        self.entries.truncate(position);
    }

    /// Running state of the latest entry with `timestamp <= at`.
    #[must_use]
    pub fn balance_as_of(&self, at: NaiveDateTime) -> StockPosition {
        let idx = self.entries.partition_point(|e| e.timestamp <= at);
        self.position_before(idx)
    }

    /// Running state of the latest entry with `timestamp < at`.
    #[must_use]
    pub fn balance_before(&self, at: NaiveDateTime) -> StockPosition {
        let idx = self.entries.partition_point(|e| e.timestamp < at);
        self.position_before(idx)
    }

    fn position_before(&self, idx: usize) -> StockPosition {
        idx.checked_sub(1)
            .map_or_else(StockPosition::zero, |i| self.entries[i].position())
    }

    /// Entries with `from <= timestamp <= to`. Open bounds are unbounded.
    #[must_use]
    pub fn range(&self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> &[LedgerEntry] {
        let start = from.map_or(0, |from| self.entries.partition_point(|e| e.timestamp < from));
        let end = to.map_or(self.entries.len(), |to| {
            self.entries.partition_point(|e| e.timestamp <= to)
        });
        if start >= end {
            &[]
        } else {
            &self.entries[start..end]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kardex_core::{CostLayer, CostLayerStore, MovementEvent, MovementKind, ValuationMethod};
    use rust_decimal_macros::dec;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn sample() -> Ledger {
        let mut ledger = Ledger::new();
        let mut store = CostLayerStore::new(ValuationMethod::WeightedAverage);
        for (seq, day) in [(1, 2), (2, 4), (3, 4), (4, 8)] {
            let intake = store
                .apply_inflow(CostLayer::new(dec!(1), dec!(10), at(day)))
                .unwrap();
            let event = MovementEvent::new("x", "w", at(day), MovementKind::Receipt, dec!(1))
                .with_unit_cost(dec!(10));
            ledger.append(kardex_core::LedgerEntry::inflow(&event, seq, intake, &store));
        }
        ledger
    }

    #[test]
    fn test_balance_as_of() {
        let ledger = sample();

        assert_eq!(ledger.balance_as_of(at(1)), StockPosition::zero());
        assert_eq!(ledger.balance_as_of(at(2)).balance, dec!(1));
        assert_eq!(ledger.balance_as_of(at(4)).balance, dec!(3));
        assert_eq!(ledger.balance_as_of(at(30)).value, dec!(40));
    }

    #[test]
    fn test_balance_before() {
        let ledger = sample();

        assert_eq!(ledger.balance_before(at(4)).balance, dec!(1));
        assert_eq!(ledger.balance_before(at(2)).balance, dec!(0));
    }

    #[test]
    fn test_range() {
        let ledger = sample();

        assert_eq!(ledger.range(None, None).len(), 4);
        assert_eq!(ledger.range(Some(at(4)), Some(at(4))).len(), 2);
        assert_eq!(ledger.range(Some(at(3)), None).len(), 3);
        assert_eq!(ledger.range(None, Some(at(3))).len(), 1);
        assert!(ledger.range(Some(at(9)), Some(at(1))).is_empty());
    }

    #[test]
    fn test_truncate_from() {
        let mut ledger = sample();
        ledger.truncate_from(1);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.last().unwrap().sequence, 1);
    }
}
