//! State of one stream: its accepted movements, cost layers and ledger.
//!
//! A stream is only ever mutated by one caller at a time (the engine holds
//! its write lock). Appends are O(1) amortized plus the layers an outflow
//! touches; anything that changes history replays from a checkpoint.

use chrono::NaiveDateTime;
use kardex_core::{
    CostLayer, CostLayerStore, Direction, LedgerEntry, MovementEvent, NegativeStockPolicy,
    Sequence, StockError, StockPosition, StreamId, ValuationMethod,
};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::{EngineError, Ledger};

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamState {
    /// No movement has been posted.
    Empty,
    /// Balance is zero or positive.
    Active,
    /// Balance is below zero (negative stock allowed for the item).
    NegativeTracking,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Active => write!(f, "active"),
            Self::NegativeTracking => write!(f, "negative"),
        }
    }
}

/// An accepted movement with the rules it was valued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMovement {
    /// The movement as submitted.
    pub event: MovementEvent,
    /// Ingestion sequence.
    pub sequence: Sequence,
    /// Method in effect for this movement.
    pub method: ValuationMethod,
    /// Negative stock policy in effect for this movement.
    pub policy: NegativeStockPolicy,
}

impl RecordedMovement {
    fn order_key(&self) -> (NaiveDateTime, Sequence) {
        (self.event.timestamp, self.sequence)
    }
}

/// Snapshot of the cost layer store after `position` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Checkpoint {
    position: usize,
    store: CostLayerStore,
}

/// Apply one movement to a store and build its ledger entry.
///
/// A method change is applied first. On error the store is unchanged.
fn post(
    store: &mut CostLayerStore,
    movement: &RecordedMovement,
) -> Result<LedgerEntry, StockError> {
    if movement.method != store.method() {
        // The switch only sticks if the movement itself is accepted.
        let mut switched = store.clone();
        switched.switch_method(movement.method, movement.event.timestamp)?;
        let entry = post_with(&mut switched, movement)?;
        *store = switched;
        return Ok(entry);
    }
    post_with(store, movement)
}

fn post_with(
    store: &mut CostLayerStore,
    movement: &RecordedMovement,
) -> Result<LedgerEntry, StockError> {
    let event = &movement.event;
    let direction = event.kind.direction().ok_or_else(|| {
        StockError::InvalidMovement(format!(
            "{} must be reconciled into an adjustment before posting",
            event.kind
        ))
    })?;

    match direction {
        Direction::In => {
            let unit_cost = event.unit_cost.ok_or_else(|| {
                StockError::InvalidMovement(format!("{} requires a unit cost", event.kind))
            })?;
            let mut layer = CostLayer::new(event.quantity, unit_cost, event.timestamp);
            layer.lot_number.clone_from(&event.lot_number);
            layer.expiration_date = event.expiration_date;
            let intake = store.apply_inflow(layer)?;
            Ok(LedgerEntry::inflow(event, movement.sequence, intake, store))
        }
        Direction::Out => {
            let consumption = store.apply_outflow(event.quantity, movement.policy)?;
            Ok(LedgerEntry::outflow(
                event,
                movement.sequence,
                consumption,
                store,
            ))
        }
    }
}

/// One (item, warehouse) stream.
#[derive(Debug, Clone)]
pub struct Stream {
    id: StreamId,
    movements: Vec<RecordedMovement>,
    ledger: Ledger,
    store: CostLayerStore,
    checkpoints: Vec<Checkpoint>,
    checkpoint_interval: usize,
    next_sequence: Sequence,
}

impl Stream {
    /// Create an empty stream.
    #[must_use]
    pub fn new(id: StreamId, method: ValuationMethod, checkpoint_interval: usize) -> Self {
        Self {
            id,
            movements: Vec::new(),
            ledger: Ledger::new(),
            store: CostLayerStore::new(method),
            checkpoints: Vec::new(),
            checkpoint_interval,
            next_sequence: 1,
        }
    }

    /// Stream identity.
    #[must_use]
    pub const fn id(&self) -> &StreamId {
        &self.id
    }

    /// The stream's ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The stream's current cost state.
    #[must_use]
    pub const fn store(&self) -> &CostLayerStore {
        &self.store
    }

    /// Accepted movements, in stream order.
    #[must_use]
    pub fn movements(&self) -> &[RecordedMovement] {
        &self.movements
    }

    /// Number of checkpoints held.
    #[must_use]
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        if self.ledger.is_empty() {
            StreamState::Empty
        } else if self.store.is_negative() {
            StreamState::NegativeTracking
        } else {
            StreamState::Active
        }
    }

    /// Current running state.
    #[must_use]
    pub fn position(&self) -> StockPosition {
        StockPosition {
            balance: self.store.current_balance(),
            value: self.store.current_value(),
            average_cost: self.store.average_cost(),
        }
    }

    /// Method of the latest movement, or of the empty store.
    #[must_use]
    pub fn current_method(&self) -> ValuationMethod {
        self.movements
            .last()
            .map_or(self.store.method(), |m| m.method)
    }

    fn stock_error(&self, error: StockError) -> EngineError {
        EngineError::from_stock(&self.id, error)
    }

    /// Append a movement at the tail.
    ///
    /// Rejects movements timestamped before the latest entry; those must go
    /// through [`Stream::insert`].
    pub fn append(
        &mut self,
        event: MovementEvent,
        method: ValuationMethod,
        policy: NegativeStockPolicy,
    ) -> Result<LedgerEntry, EngineError> {
        if let Some(last) = self.movements.last() {
            if event.timestamp < last.event.timestamp {
                return Err(EngineError::OutOfOrderEvent {
                    stream: self.id.clone(),
                    timestamp: event.timestamp,
                    latest: last.event.timestamp,
                });
            }
        }

        let movement = RecordedMovement {
            event,
            sequence: self.next_sequence,
            method,
            policy,
        };
        let entry = post(&mut self.store, &movement).map_err(|e| self.stock_error(e))?;

        self.next_sequence += 1;
        self.movements.push(movement);
        self.ledger.append(entry.clone());
        self.maybe_checkpoint();

        Ok(entry)
    }

    /// Insert a movement at its timestamp and replay everything after it.
    ///
    /// The movement is valued with the method in effect at its position:
    /// that of the movement before it, else the one after it, else
    /// `method`. Returns the new entry.
    ///
    /// On error the stream is left partially replayed; callers work on a
    /// copy.
    pub fn insert(
        &mut self,
        event: MovementEvent,
        method: ValuationMethod,
        policy: NegativeStockPolicy,
    ) -> Result<LedgerEntry, EngineError> {
        let sequence = self.next_sequence;
        let key = (event.timestamp, sequence);
        let position = self.movements.partition_point(|m| m.order_key() < key);

        let method = position
            .checked_sub(1)
            .and_then(|i| self.movements.get(i))
            .or_else(|| self.movements.get(position))
            .map_or(method, |m| m.method);

        self.movements.insert(
            position,
            RecordedMovement {
                event,
                sequence,
                method,
                policy,
            },
        );
        self.next_sequence += 1;

        self.replay_from(position)?;
        Ok(self.ledger.entries()[position].clone())
    }

    /// Replace the movement with `sequence` and replay.
    ///
    /// The amended movement keeps its sequence and valuation rules.
    pub fn amend(
        &mut self,
        sequence: Sequence,
        event: MovementEvent,
    ) -> Result<LedgerEntry, EngineError> {
        let old_position = self.index_of(sequence)?;
        let mut movement = self.movements.remove(old_position);
        movement.event = event;

        let key = movement.order_key();
        let new_position = self.movements.partition_point(|m| m.order_key() < key);
        self.movements.insert(new_position, movement);

        self.replay_from(old_position.min(new_position))?;
        Ok(self.ledger.entries()[new_position].clone())
    }

    /// Remove the movement with `sequence` and replay.
    pub fn void(&mut self, sequence: Sequence) -> Result<MovementEvent, EngineError> {
        let position = self.index_of(sequence)?;
        let movement = self.movements.remove(position);
        self.replay_from(position)?;
        Ok(movement.event)
    }

    /// Replay every movement whose sequence is at least `from`, and all
    /// movements after the earliest of them. Returns the replayed count.
    pub fn recompute(&mut self, from: Sequence) -> Result<usize, EngineError> {
        let position = self
            .movements
            .iter()
            .position(|m| m.sequence >= from)
            .unwrap_or(self.movements.len());
        self.replay_from(position)
    }

    /// Re-value the whole stream under `method`, from empty.
    pub fn recost(&mut self, method: ValuationMethod) -> Result<usize, EngineError> {
        for movement in &mut self.movements {
            movement.method = method;
        }
        self.checkpoints.clear();
        self.store = CostLayerStore::new(method);
        self.replay_from(0)
    }

    fn index_of(&self, sequence: Sequence) -> Result<usize, EngineError> {
        self.movements
            .iter()
            .position(|m| m.sequence == sequence)
            .ok_or_else(|| EngineError::UnknownSequence {
                stream: self.id.clone(),
                sequence,
            })
    }

    /// Rebuild the store and ledger from the last checkpoint at or before
    /// `position`.
    fn replay_from(&mut self, position: usize) -> Result<usize, EngineError> {
        self.checkpoints.retain(|c| c.position <= position);

        let (start, store) = match self.checkpoints.last() {
            Some(checkpoint) => (checkpoint.position, checkpoint.store.clone()),
            None => {
                let method = self
                    .movements
                    .first()
                    .map_or(self.store.method(), |m| m.method);
                (0, CostLayerStore::new(method))
            }
        };

        self.ledger.truncate_from(start);
        self.store = store;
        debug!(stream = %self.id, start, position, "replaying stream");

        for i in start..self.movements.len() {
            let entry = post(&mut self.store, &self.movements[i])
                .map_err(|e| EngineError::from_stock(&self.id, e))?;
            self.ledger.append(entry);
            self.maybe_checkpoint();
        }

        Ok(self.movements.len() - start)
    }

    fn maybe_checkpoint(&mut self) {
        let position = self.ledger.len();
        if self.checkpoint_interval == 0 || position % self.checkpoint_interval != 0 {
            return;
        }
        if self.checkpoints.last().is_some_and(|c| c.position >= position) {
            return;
        }
        self.checkpoints.push(Checkpoint {
            position,
            store: self.store.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kardex_core::MovementKind;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn receipt(day: u32, quantity: Decimal, cost: Decimal) -> MovementEvent {
        MovementEvent::new("beans", "main", at(day), MovementKind::Receipt, quantity)
            .with_unit_cost(cost)
    }

    fn issue(day: u32, quantity: Decimal) -> MovementEvent {
        MovementEvent::new("beans", "main", at(day), MovementKind::Issue, quantity)
    }

    fn stream(interval: usize) -> Stream {
        Stream::new(
            StreamId::new("beans", "main"),
            ValuationMethod::Fifo,
            interval,
        )
    }

    const FIFO: ValuationMethod = ValuationMethod::Fifo;
    const REJECT: NegativeStockPolicy = NegativeStockPolicy::Reject;

    #[test]
    fn test_state_machine() {
        let mut s = stream(0);
        assert_eq!(s.state(), StreamState::Empty);

        s.append(receipt(1, dec!(1), dec!(5)), FIFO, REJECT).unwrap();
        assert_eq!(s.state(), StreamState::Active);

        s.append(issue(2, dec!(3)), FIFO, NegativeStockPolicy::Allow)
            .unwrap();
        assert_eq!(s.state(), StreamState::NegativeTracking);

        s.append(receipt(3, dec!(2), dec!(5)), FIFO, REJECT).unwrap();
        assert_eq!(s.state(), StreamState::Active);
    }

    #[test]
    fn test_sequences_increase() {
        let mut s = stream(0);
        let a = s.append(receipt(1, dec!(1), dec!(5)), FIFO, REJECT).unwrap();
        let b = s.append(receipt(1, dec!(1), dec!(5)), FIFO, REJECT).unwrap();
        assert_eq!((a.sequence, b.sequence), (1, 2));
    }

    #[test]
    fn test_rejected_append_consumes_nothing() {
        let mut s = stream(0);
        s.append(receipt(1, dec!(1), dec!(5)), FIFO, REJECT).unwrap();

        let err = s.append(issue(2, dec!(2)), FIFO, REJECT).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStock { .. }));

        let next = s.append(issue(2, dec!(1)), FIFO, REJECT).unwrap();
        assert_eq!(next.sequence, 2);
        assert_eq!(s.ledger().len(), 2);
    }

    #[test]
    fn test_out_of_order_append() {
        let mut s = stream(0);
        s.append(receipt(5, dec!(1), dec!(5)), FIFO, REJECT).unwrap();

        let err = s
            .append(receipt(4, dec!(1), dec!(5)), FIFO, REJECT)
            .unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrderEvent { .. }));
    }

    #[test]
    fn test_checkpoints_are_taken_and_reused() {
        let mut s = stream(2);
        for day in 1..=6 {
            s.append(receipt(day, dec!(1), Decimal::from(day)), FIFO, REJECT)
                .unwrap();
        }
        assert_eq!(s.checkpoint_count(), 3);

        let before = s.ledger().clone();
        let replayed = s.recompute(5).unwrap();

        assert_eq!(replayed, 2);
        assert_eq!(s.ledger(), &before);
    }

    #[test]
    fn test_insert_replays_suffix() {
        let mut s = stream(0);
        s.append(receipt(1, dec!(10), dec!(100)), FIFO, REJECT)
            .unwrap();
        s.append(issue(5, dec!(10)), FIFO, REJECT).unwrap();

        s.insert(receipt(3, dec!(10), dec!(200)), FIFO, REJECT)
            .unwrap();

        let entries = s.ledger().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].sequence, 3);
        assert_eq!(entries[2].running_balance, dec!(10));
        assert_eq!(entries[2].running_value, dec!(2000));
    }

    #[test]
    fn test_void_and_amend() {
        let mut s = stream(0);
        s.append(receipt(1, dec!(10), dec!(100)), FIFO, REJECT)
            .unwrap();
        s.append(receipt(2, dec!(10), dec!(300)), FIFO, REJECT)
            .unwrap();
        s.append(issue(3, dec!(5)), FIFO, REJECT).unwrap();

        let amended = s.amend(1, receipt(1, dec!(10), dec!(120))).unwrap();
        assert_eq!(amended.unit_cost, dec!(120));
        assert_eq!(s.ledger().entries()[2].total_value, dec!(600));

        let voided = s.void(2).unwrap();
        assert_eq!(voided.unit_cost, Some(dec!(300)));
        assert_eq!(s.position().balance, dec!(5));
        assert_eq!(s.position().value, dec!(600));
    }

    #[test]
    fn test_unknown_sequence() {
        let mut s = stream(0);
        assert!(matches!(
            s.void(9),
            Err(EngineError::UnknownSequence { sequence: 9, .. })
        ));
    }

    #[test]
    fn test_method_change_preserves_history() {
        let mut s = stream(0);
        s.append(receipt(1, dec!(10), dec!(100)), FIFO, REJECT)
            .unwrap();
        s.append(receipt(2, dec!(10), dec!(200)), FIFO, REJECT)
            .unwrap();
        s.append(
            issue(3, dec!(10)),
            ValuationMethod::WeightedAverage,
            REJECT,
        )
        .unwrap();

        let entries = s.ledger().entries();
        assert_eq!(entries[0].method, FIFO);
        assert_eq!(entries[2].method, ValuationMethod::WeightedAverage);
        assert_eq!(entries[2].unit_cost, dec!(150));

        s.recompute(0).unwrap();
        assert_eq!(s.ledger().entries()[0].method, FIFO);
        assert_eq!(s.ledger().entries()[2].unit_cost, dec!(150));
    }

    #[test]
    fn test_recost() {
        let mut s = stream(0);
        s.append(receipt(1, dec!(10), dec!(100)), FIFO, REJECT)
            .unwrap();
        s.append(receipt(2, dec!(10), dec!(200)), FIFO, REJECT)
            .unwrap();
        s.append(issue(3, dec!(12)), FIFO, REJECT).unwrap();

        s.recost(ValuationMethod::Lifo).unwrap();

        let last = s.ledger().last().unwrap();
        assert_eq!(last.method, ValuationMethod::Lifo);
        assert_eq!(last.total_value, dec!(2200));
        assert_eq!(s.current_method(), ValuationMethod::Lifo);
    }
}
