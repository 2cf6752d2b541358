//! Ledger output types.
//!
//! A [`LedgerEntry`] is produced once per accepted movement and carries the
//! running state of its stream after that movement. A [`PeriodSummary`] is
//! derived from entries on demand and never stored.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    Consumption, ConsumedLayer, CostLayerStore, Intake, MovementEvent, MovementKind, Sequence,
    ValuationMethod,
};

/// One line of the kardex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Ingestion sequence of the movement.
    pub sequence: Sequence,
    /// Timestamp of the movement.
    pub timestamp: NaiveDateTime,
    /// Item identifier.
    pub item_id: String,
    /// Warehouse identifier.
    pub warehouse_id: String,
    /// Kind of the movement.
    pub kind: MovementKind,
    /// Method the movement was valued with.
    pub method: ValuationMethod,
    /// Quantity received (zero for outflows).
    pub quantity_in: Decimal,
    /// Quantity issued (zero for inflows).
    pub quantity_out: Decimal,
    /// Supplied cost for inflows, computed consumption cost for outflows.
    pub unit_cost: Decimal,
    /// Value that entered or left with this movement.
    pub total_value: Decimal,
    /// Quantity on hand after this movement.
    pub running_balance: Decimal,
    /// Value on hand after this movement.
    pub running_value: Decimal,
    /// Unit cost on hand after this movement.
    pub running_average_cost: Decimal,
    /// Set when the movement was costed against, or settled, a negative
    /// balance.
    pub negative_stock: bool,
    /// Revaluation of a settled negative balance, counted as consumed.
    /// `running_value` is the previous running value plus `total_value`
    /// minus this.
    #[serde(default, skip_serializing_if = "Decimal::is_zero")]
    pub settlement_variance: Decimal,
    /// Layers an outflow drew from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_layers: Vec<ConsumedLayer>,
    /// Lot number of the movement.
    pub lot_number: Option<String>,
    /// Lot expiration date of the movement.
    pub expiration_date: Option<NaiveDate>,
    /// Source document number.
    pub document_number: Option<String>,
    /// Free-form reference.
    pub reference: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

impl LedgerEntry {
    fn from_event(event: &MovementEvent, sequence: Sequence, store: &CostLayerStore) -> Self {
        Self {
            sequence,
            timestamp: event.timestamp,
            item_id: event.item_id.clone(),
            warehouse_id: event.warehouse_id.clone(),
            kind: event.kind,
            method: store.method(),
            quantity_in: Decimal::ZERO,
            quantity_out: Decimal::ZERO,
            unit_cost: Decimal::ZERO,
            total_value: Decimal::ZERO,
            running_balance: store.current_balance(),
            running_value: store.current_value(),
            running_average_cost: store.average_cost(),
            negative_stock: store.is_negative(),
            settlement_variance: Decimal::ZERO,
            consumed_layers: Vec::new(),
            lot_number: event.lot_number.clone(),
            expiration_date: event.expiration_date,
            document_number: event.document_number.clone(),
            reference: event.reference.clone(),
            description: event.description.clone(),
        }
    }

    /// Build the entry for an inflow already applied to `store`.
    #[must_use]
    pub fn inflow(
        event: &MovementEvent,
        sequence: Sequence,
        intake: Intake,
        store: &CostLayerStore,
    ) -> Self {
        let base = Self::from_event(event, sequence, store);
        Self {
            quantity_in: intake.quantity,
            unit_cost: event.unit_cost.unwrap_or_default(),
            total_value: intake.total_cost,
            negative_stock: base.negative_stock || intake.is_settlement(),
            settlement_variance: intake.variance,
            ..base
        }
    }

    /// Build the entry for an outflow already applied to `store`.
    #[must_use]
    pub fn outflow(
        event: &MovementEvent,
        sequence: Sequence,
        consumption: Consumption,
        store: &CostLayerStore,
    ) -> Self {
        let base = Self::from_event(event, sequence, store);
        Self {
            quantity_out: consumption.quantity,
            unit_cost: consumption.unit_cost,
            total_value: consumption.total_cost,
            negative_stock: base.negative_stock || consumption.is_short(),
            consumed_layers: consumption.layers,
            ..base
        }
    }

    /// Signed quantity change of this entry.
    #[must_use]
    pub fn net_quantity(&self) -> Decimal {
        self.quantity_in - self.quantity_out
    }

    /// Running state after this entry.
    #[must_use]
    pub fn position(&self) -> StockPosition {
        StockPosition {
            balance: self.running_balance,
            value: self.running_value,
            average_cost: self.running_average_cost,
        }
    }

    /// Ordering key within a stream.
    #[must_use]
    pub const fn order_key(&self) -> (NaiveDateTime, Sequence) {
        (self.timestamp, self.sequence)
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} {} in={} out={} @{} = {} | bal={} val={}",
            self.timestamp,
            self.sequence,
            self.kind,
            self.quantity_in,
            self.quantity_out,
            self.unit_cost,
            self.total_value,
            self.running_balance,
            self.running_value
        )?;
        if self.negative_stock {
            write!(f, " !")?;
        }
        Ok(())
    }
}

/// Quantity, value and unit cost on hand at some point of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    /// Quantity on hand.
    pub balance: Decimal,
    /// Value on hand.
    pub value: Decimal,
    /// Unit cost on hand.
    pub average_cost: Decimal,
}

impl StockPosition {
    /// The position of a stream with no entries.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            balance: Decimal::ZERO,
            value: Decimal::ZERO,
            average_cost: Decimal::ZERO,
        }
    }
}

/// Opening/closing balances and flows over a date window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// Window start (inclusive).
    pub from: NaiveDateTime,
    /// Window end (inclusive).
    pub to: NaiveDateTime,
    /// Balance strictly before the window.
    pub opening_balance: Decimal,
    /// Value strictly before the window.
    pub opening_value: Decimal,
    /// Quantity received inside the window.
    pub total_in: Decimal,
    /// Value received inside the window.
    pub total_in_value: Decimal,
    /// Quantity issued inside the window.
    pub total_out: Decimal,
    /// Value issued inside the window.
    pub total_out_value: Decimal,
    /// Balance at the window end.
    pub closing_balance: Decimal,
    /// Value at the window end.
    pub closing_value: Decimal,
    /// Value of outflows inside the window.
    pub cost_of_goods_consumed: Decimal,
    /// Average inflow cost in the window, or the current average when
    /// nothing came in.
    pub period_average_price: Decimal,
    /// Number of entries inside the window.
    pub entry_count: usize,
}

impl PeriodSummary {
    /// Add another stream's summary over the same window.
    ///
    /// The period average price is re-derived from the combined inflows,
    /// falling back to the combined closing unit cost.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let total_in = self.total_in + other.total_in;
        let total_in_value = self.total_in_value + other.total_in_value;
        let closing_balance = self.closing_balance + other.closing_balance;
        let closing_value = self.closing_value + other.closing_value;

        let period_average_price = if total_in > Decimal::ZERO {
            total_in_value / total_in
        } else if !closing_balance.is_zero() {
            closing_value / closing_balance
        } else {
            Decimal::ZERO
        };

        Self {
            from: self.from,
            to: self.to,
            opening_balance: self.opening_balance + other.opening_balance,
            opening_value: self.opening_value + other.opening_value,
            total_in,
            total_in_value,
            total_out: self.total_out + other.total_out,
            total_out_value: self.total_out_value + other.total_out_value,
            closing_balance,
            closing_value,
            cost_of_goods_consumed: self.cost_of_goods_consumed + other.cost_of_goods_consumed,
            period_average_price,
            entry_count: self.entry_count + other.entry_count,
        }
    }
}
