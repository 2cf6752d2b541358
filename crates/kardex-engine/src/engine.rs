//! The valuation engine.
//!
//! The engine owns one [`Stream`] per (item, warehouse) pair. Each stream
//! sits behind its own read/write lock: writers are serialized per stream,
//! readers see either the state before or after a write, and distinct
//! streams never contend.
//!
//! Two write paths exist:
//! - [`ValuationEngine::record_movement`] appends at the tail.
//! - Back-dated inserts, amendments, voids, recomputes and recosts replay
//!   the affected suffix on a working copy and commit it only on success.

use chrono::{NaiveDate, NaiveDateTime};
use kardex_core::{
    CostLayer, LedgerEntry, MovementEvent, MovementKind, NegativeStockPolicy, PeriodSummary,
    Sequence, StockPosition, StreamId, ValuationMethod,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::stream::{Stream, StreamState};
use crate::{summary, EngineConfig, EngineError, InMemoryRegistry, ItemRegistry};

struct StreamCell {
    stream: RwLock<Stream>,
    recomputing: AtomicBool,
}

impl StreamCell {
    fn new(stream: Stream) -> Self {
        Self {
            stream: RwLock::new(stream),
            recomputing: AtomicBool::new(false),
        }
    }
}

/// Clears the recompute flag when dropped.
struct RecomputeGuard<'a>(&'a AtomicBool);

impl Drop for RecomputeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Inventory valuation engine.
///
/// # Examples
///
/// ```
/// use kardex_engine::{EngineConfig, ValuationEngine};
/// use kardex_core::{MovementEvent, MovementKind, StreamId};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let engine = ValuationEngine::with_config(EngineConfig::default());
/// let stream = StreamId::new("tomato", "kitchen");
/// let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap().and_hms_opt(8, 0, 0).unwrap();
///
/// engine.record_movement(&stream,
///     MovementEvent::new("tomato", "kitchen", day(1), MovementKind::Receipt, dec!(5))
///         .with_unit_cost(dec!(1000))).unwrap();
/// engine.record_movement(&stream,
///     MovementEvent::new("tomato", "kitchen", day(2), MovementKind::Receipt, dec!(5))
///         .with_unit_cost(dec!(1200))).unwrap();
/// let issue = engine.record_movement(&stream,
///     MovementEvent::new("tomato", "kitchen", day(3), MovementKind::Issue, dec!(8))).unwrap();
///
/// assert_eq!(issue.unit_cost, dec!(1100));
/// assert_eq!(issue.running_balance, dec!(2));
/// assert_eq!(issue.running_value, dec!(2200));
/// ```
pub struct ValuationEngine {
    config: EngineConfig,
    registry: Arc<dyn ItemRegistry>,
    streams: RwLock<HashMap<StreamId, Arc<StreamCell>>>,
}

impl std::fmt::Debug for ValuationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValuationEngine")
            .field("config", &self.config)
            .field("streams", &self.streams.read().len())
            .finish_non_exhaustive()
    }
}

impl ValuationEngine {
    /// Create an engine reading item rules from `registry`.
    #[must_use]
    pub fn new(config: EngineConfig, registry: Arc<dyn ItemRegistry>) -> Self {
        Self {
            config,
            registry,
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Create an engine with an in-memory registry seeded from `config`.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let registry = Arc::new(InMemoryRegistry::from_config(&config));
        Self::new(config, registry)
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The item registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn ItemRegistry> {
        &self.registry
    }

    fn method_for(&self, item_id: &str) -> ValuationMethod {
        self.registry
            .valuation_method(item_id)
            .unwrap_or(self.config.default_method)
    }

    fn policy_for(&self, item_id: &str) -> NegativeStockPolicy {
        self.registry
            .negative_stock_policy(item_id)
            .unwrap_or(self.config.default_negative_stock)
    }

    /// An item's unit of measure.
    #[must_use]
    pub fn unit(&self, item_id: &str) -> Option<String> {
        self.registry.unit(item_id)
    }

    fn cell(&self, stream: &StreamId) -> Option<Arc<StreamCell>> {
        self.streams.read().get(stream).cloned()
    }

    /// Run `op` on a new, empty stream and register the stream only if it
    /// succeeds. Returns `None` without running `op` when the stream
    /// already exists.
    fn create_stream<T>(
        &self,
        stream: &StreamId,
        op: impl FnOnce(&mut Stream, ValuationMethod, NegativeStockPolicy) -> Result<T, EngineError>,
    ) -> Result<Option<T>, EngineError> {
        let method = self.method_for(&stream.item_id);
        let policy = self.policy_for(&stream.item_id);

        let mut streams = self.streams.write();
        if streams.contains_key(stream) {
            return Ok(None);
        }
        let mut created = Stream::new(stream.clone(), method, self.config.checkpoint_interval);
        let result = op(&mut created, method, policy)?;
        streams.insert(stream.clone(), Arc::new(StreamCell::new(created)));
        Ok(Some(result))
    }

    fn check_event(stream: &StreamId, event: &MovementEvent) -> Result<(), EngineError> {
        if !event.belongs_to(stream) {
            return Err(EngineError::InvalidMovement(format!(
                "movement for {} submitted to {stream}",
                event.stream_id()
            )));
        }
        event
            .validate()
            .map_err(|e| EngineError::from_stock(stream, e))?;
        if event.kind.direction().is_none() {
            return Err(EngineError::InvalidMovement(format!(
                "{} must be reconciled into an adjustment before posting",
                event.kind
            )));
        }
        Ok(())
    }

    /// Record a movement at the tail of its stream.
    ///
    /// Fails with [`EngineError::OutOfOrderEvent`] if the movement is
    /// timestamped before the stream's latest entry, and with
    /// [`EngineError::RecomputeInProgress`] while the stream is replaying.
    #[tracing::instrument(skip(self, event), fields(stream = %stream, kind = %event.kind))]
    pub fn record_movement(
        &self,
        stream: &StreamId,
        event: MovementEvent,
    ) -> Result<LedgerEntry, EngineError> {
        Self::check_event(stream, &event)?;

        let entry = match self.cell(stream) {
            Some(cell) => self.append_to(&cell, stream, event)?,
            None => match self.create_stream(stream, |s, method, policy| {
                s.append(event.clone(), method, policy)
            })? {
                Some(entry) => entry,
                None => self.append_to(&*self.existing(stream)?, stream, event)?,
            },
        };

        debug!(
            sequence = entry.sequence,
            balance = %entry.running_balance,
            value = %entry.running_value,
            "movement recorded"
        );
        if entry.negative_stock {
            warn!(
                sequence = entry.sequence,
                balance = %entry.running_balance,
                "movement accepted against negative stock"
            );
        }

        Ok(entry)
    }

    fn append_to(
        &self,
        cell: &StreamCell,
        stream: &StreamId,
        event: MovementEvent,
    ) -> Result<LedgerEntry, EngineError> {
        if cell.recomputing.load(Ordering::Acquire) {
            return Err(EngineError::RecomputeInProgress {
                stream: stream.clone(),
            });
        }

        let method = self.method_for(&stream.item_id);
        let policy = self.policy_for(&stream.item_id);

        cell.stream.write().append(event, method, policy)
    }

    /// Run a history-changing operation on a working copy of a stream.
    fn rewrite<T>(
        &self,
        cell: &StreamCell,
        stream_id: &StreamId,
        op: impl FnOnce(&mut Stream) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if cell.recomputing.swap(true, Ordering::AcqRel) {
            return Err(EngineError::RecomputeInProgress {
                stream: stream_id.clone(),
            });
        }
        let _guard = RecomputeGuard(&cell.recomputing);

        let mut stream = cell.stream.write();
        let mut work = stream.clone();
        let result = op(&mut work)?;
        *stream = work;
        Ok(result)
    }

    fn existing(&self, stream: &StreamId) -> Result<Arc<StreamCell>, EngineError> {
        self.cell(stream)
            .ok_or_else(|| EngineError::UnknownStream(stream.clone()))
    }

    /// Insert a back-dated movement and recompute every later entry.
    #[tracing::instrument(skip(self, event), fields(stream = %stream, kind = %event.kind))]
    pub fn insert_backdated(
        &self,
        stream: &StreamId,
        event: MovementEvent,
    ) -> Result<LedgerEntry, EngineError> {
        Self::check_event(stream, &event)?;

        let entry = match self.cell(stream) {
            Some(cell) => self.insert_into(&cell, stream, event)?,
            None => match self.create_stream(stream, |s, method, policy| {
                s.insert(event.clone(), method, policy)
            })? {
                Some(entry) => entry,
                None => self.insert_into(&*self.existing(stream)?, stream, event)?,
            },
        };

        info!(sequence = entry.sequence, timestamp = %entry.timestamp, "back-dated movement inserted");
        Ok(entry)
    }

    fn insert_into(
        &self,
        cell: &StreamCell,
        stream: &StreamId,
        event: MovementEvent,
    ) -> Result<LedgerEntry, EngineError> {
        self.rewrite(cell, stream, |s| {
            let method = self.method_for(&stream.item_id);
            let policy = self.policy_for(&stream.item_id);
            s.insert(event, method, policy)
        })
    }

    /// Replace a recorded movement and recompute from its position.
    #[tracing::instrument(skip(self, event), fields(stream = %stream))]
    pub fn amend_movement(
        &self,
        stream: &StreamId,
        sequence: Sequence,
        event: MovementEvent,
    ) -> Result<LedgerEntry, EngineError> {
        Self::check_event(stream, &event)?;

        let cell = self.existing(stream)?;
        let entry = self.rewrite(&cell, stream, |s| s.amend(sequence, event))?;

        info!(sequence, "movement amended");
        Ok(entry)
    }

    /// Remove a recorded movement and recompute from its position.
    #[tracing::instrument(skip(self), fields(stream = %stream))]
    pub fn void_movement(
        &self,
        stream: &StreamId,
        sequence: Sequence,
    ) -> Result<MovementEvent, EngineError> {
        let cell = self.existing(stream)?;
        let event = self.rewrite(&cell, stream, |s| s.void(sequence))?;

        info!(sequence, "movement voided");
        Ok(event)
    }

    /// Rebuild a stream's cost layers and ledger from the earliest movement
    /// with a sequence of at least `from`. Returns the replayed count.
    #[tracing::instrument(skip(self), fields(stream = %stream))]
    pub fn recompute(&self, stream: &StreamId, from: Sequence) -> Result<usize, EngineError> {
        let cell = self.existing(stream)?;
        let replayed = self.rewrite(&cell, stream, |s| s.recompute(from))?;

        info!(from, replayed, "stream recomputed");
        Ok(replayed)
    }

    /// Re-value a whole stream under `method`.
    ///
    /// Every recorded movement is reassigned to `method` and replayed from
    /// empty. Later movements follow the registry again, so the registry
    /// should be updated alongside.
    #[tracing::instrument(skip(self), fields(stream = %stream, method = %method))]
    pub fn recost_item(
        &self,
        stream: &StreamId,
        method: ValuationMethod,
    ) -> Result<(), EngineError> {
        let cell = self.existing(stream)?;
        let replayed = self.rewrite(&cell, stream, |s| s.recost(method))?;

        info!(replayed, "stream recosted");
        Ok(())
    }

    /// Translate a physical count into the adjustment that reconciles it.
    ///
    /// `count.quantity` is the counted quantity. The difference against the
    /// balance as of the count's timestamp becomes an `AdjustmentIncrease`
    /// (valued at the count's unit cost, else the current average) or an
    /// `AdjustmentDecrease`. Returns `None` when the count agrees.
    pub fn reconcile_count(
        &self,
        stream: &StreamId,
        count: &MovementEvent,
    ) -> Result<Option<MovementEvent>, EngineError> {
        if count.kind != MovementKind::PhysicalCount {
            return Err(EngineError::InvalidMovement(format!(
                "expected a physical count, got {}",
                count.kind
            )));
        }
        if !count.belongs_to(stream) {
            return Err(EngineError::InvalidMovement(format!(
                "count for {} submitted to {stream}",
                count.stream_id()
            )));
        }
        count
            .validate()
            .map_err(|e| EngineError::from_stock(stream, e))?;

        let (book, average_cost) = self.cell(stream).map_or(
            (Decimal::ZERO, Decimal::ZERO),
            |cell| {
                let s = cell.stream.read();
                (
                    s.ledger().balance_as_of(count.timestamp).balance,
                    s.store().average_cost(),
                )
            },
        );

        let delta = count.quantity - book;
        if delta.is_zero() {
            return Ok(None);
        }

        let mut adjustment = count.clone();
        if delta > Decimal::ZERO {
            adjustment.kind = MovementKind::AdjustmentIncrease;
            adjustment.quantity = delta;
            adjustment.unit_cost = Some(count.unit_cost.unwrap_or(average_cost));
        } else {
            adjustment.kind = MovementKind::AdjustmentDecrease;
            adjustment.quantity = -delta;
            adjustment.unit_cost = None;
        }
        Ok(Some(adjustment))
    }

    /// Ledger entries of a stream with `from <= timestamp <= to`.
    ///
    /// A stream with no movements has an empty ledger.
    #[must_use]
    pub fn get_ledger(
        &self,
        stream: &StreamId,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Vec<LedgerEntry> {
        self.cell(stream).map_or_else(Vec::new, |cell| {
            cell.stream.read().ledger().range(from, to).to_vec()
        })
    }

    /// Running state of a stream as of `at`.
    #[must_use]
    pub fn balance_as_of(&self, stream: &StreamId, at: NaiveDateTime) -> StockPosition {
        self.cell(stream).map_or_else(StockPosition::zero, |cell| {
            cell.stream.read().ledger().balance_as_of(at)
        })
    }

    /// Period summary of one stream.
    pub fn get_summary(
        &self,
        stream: &StreamId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<PeriodSummary, EngineError> {
        if from > to {
            return Err(EngineError::InvalidPeriod { from, to });
        }
        Ok(self.cell(stream).map_or_else(
            || summary::empty(from, to),
            |cell| {
                let s = cell.stream.read();
                summary::summarize(s.ledger(), from, to, s.store().average_cost())
            },
        ))
    }

    /// Period summary of an item across all its warehouses.
    pub fn summarize_item(
        &self,
        item_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<PeriodSummary, EngineError> {
        let mut total = summary::empty(from, to);
        for stream in self.streams().iter().filter(|s| s.item_id == item_id) {
            total = total.combine(&self.get_summary(stream, from, to)?);
        }
        Ok(total)
    }

    /// Lifecycle state of a stream.
    #[must_use]
    pub fn stream_state(&self, stream: &StreamId) -> StreamState {
        self.cell(stream)
            .map_or(StreamState::Empty, |cell| cell.stream.read().state())
    }

    /// Current running state of a stream.
    #[must_use]
    pub fn current_position(&self, stream: &StreamId) -> StockPosition {
        self.cell(stream)
            .map_or_else(StockPosition::zero, |cell| cell.stream.read().position())
    }

    /// Active cost layers of a stream, oldest first.
    #[must_use]
    pub fn cost_layers(&self, stream: &StreamId) -> Vec<CostLayer> {
        self.cell(stream).map_or_else(Vec::new, |cell| {
            cell.stream.read().store().layers().iter().cloned().collect()
        })
    }

    /// Active layers expiring on or before `date`.
    #[must_use]
    pub fn expiring_layers(&self, stream: &StreamId, date: NaiveDate) -> Vec<CostLayer> {
        self.cell(stream).map_or_else(Vec::new, |cell| {
            cell.stream
                .read()
                .store()
                .expiring(date)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// All known streams, sorted.
    #[must_use]
    pub fn streams(&self) -> Vec<StreamId> {
        let mut streams: Vec<StreamId> = self.streams.read().keys().cloned().collect();
        streams.sort();
        streams
    }
}
