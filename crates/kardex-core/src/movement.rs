//! Movement events: the immutable input facts of a stock ledger.
//!
//! A [`MovementEvent`] records one physical stock change for one item in one
//! warehouse. Its direction is implied by its [`MovementKind`]; the stored
//! quantity is always non-negative.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::StockError;

/// Ingestion sequence number, strictly increasing within a stream.
pub type Sequence = u64;

/// Identity of a ledger stream: one (item, warehouse) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    /// Item identifier.
    pub item_id: String,
    /// Warehouse identifier.
    pub warehouse_id: String,
}

impl StreamId {
    /// Create a stream id.
    #[must_use]
    pub fn new(item_id: impl Into<String>, warehouse_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            warehouse_id: warehouse_id.into(),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.item_id, self.warehouse_id)
    }
}

/// Whether a movement adds stock to or removes stock from a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Stock enters at a supplied unit cost.
    In,
    /// Stock leaves at a cost computed by the valuation method.
    Out,
}

/// Canonical document type a movement is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// Purchase or production receipt.
    Receipt,
    /// Consumption or sale.
    Issue,
    /// Movement between warehouses.
    Transfer,
    /// Inventory correction.
    Adjustment,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receipt => write!(f, "receipt"),
            Self::Issue => write!(f, "issue"),
            Self::Transfer => write!(f, "transfer"),
            Self::Adjustment => write!(f, "adjustment"),
        }
    }
}

/// The kind of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received from a supplier or production.
    Receipt,
    /// Goods consumed, sold or otherwise issued.
    Issue,
    /// Goods arriving from another warehouse.
    TransferIn,
    /// Goods leaving for another warehouse.
    TransferOut,
    /// Positive inventory correction.
    AdjustmentIncrease,
    /// Negative inventory correction.
    AdjustmentDecrease,
    /// Counted quantity on hand. Must be reconciled into an adjustment
    /// before it can be posted.
    PhysicalCount,
}

impl MovementKind {
    /// All movement kinds, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Receipt,
        Self::Issue,
        Self::TransferIn,
        Self::TransferOut,
        Self::AdjustmentIncrease,
        Self::AdjustmentDecrease,
        Self::PhysicalCount,
    ];

    /// The balance direction of this kind.
    ///
    /// `PhysicalCount` has no direction: the delta depends on the balance
    /// at the time of the count.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Receipt | Self::TransferIn | Self::AdjustmentIncrease => Some(Direction::In),
            Self::Issue | Self::TransferOut | Self::AdjustmentDecrease => Some(Direction::Out),
            Self::PhysicalCount => None,
        }
    }

    /// Map this kind onto its canonical document type.
    #[must_use]
    pub const fn document_type(self) -> DocumentType {
        match self {
            Self::Receipt => DocumentType::Receipt,
            Self::Issue => DocumentType::Issue,
            Self::TransferIn | Self::TransferOut => DocumentType::Transfer,
            Self::AdjustmentIncrease | Self::AdjustmentDecrease | Self::PhysicalCount => {
                DocumentType::Adjustment
            }
        }
    }

    /// Check if this kind increases the balance.
    #[must_use]
    pub const fn is_inflow(self) -> bool {
        matches!(self.direction(), Some(Direction::In))
    }

    /// Check if this kind decreases the balance.
    #[must_use]
    pub const fn is_outflow(self) -> bool {
        matches!(self.direction(), Some(Direction::Out))
    }

    /// Stable external name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Issue => "issue",
            Self::TransferIn => "transfer_in",
            Self::TransferOut => "transfer_out",
            Self::AdjustmentIncrease => "adjustment_increase",
            Self::AdjustmentDecrease => "adjustment_decrease",
            Self::PhysicalCount => "physical_count",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an external movement kind string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown movement kind: {0}")]
pub struct UnknownMovementKind(pub String);

impl FromStr for MovementKind {
    type Err = UnknownMovementKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "receipt" | "purchase" => Ok(Self::Receipt),
            "issue" | "consumption" | "sale" => Ok(Self::Issue),
            "transfer_in" => Ok(Self::TransferIn),
            "transfer_out" => Ok(Self::TransferOut),
            "adjustment_increase" => Ok(Self::AdjustmentIncrease),
            "adjustment_decrease" => Ok(Self::AdjustmentDecrease),
            "physical_count" | "count" => Ok(Self::PhysicalCount),
            _ => Err(UnknownMovementKind(s.to_string())),
        }
    }
}

/// One physical stock change for one item in one warehouse.
///
/// # Examples
///
/// ```
/// use kardex_core::{MovementEvent, MovementKind};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let at = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let receipt = MovementEvent::new("flour", "main", at, MovementKind::Receipt, dec!(25))
///     .with_unit_cost(dec!(1.20))
///     .with_lot("L-0301");
///
/// assert!(receipt.validate().is_ok());
/// assert_eq!(receipt.stream_id().to_string(), "flour@main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEvent {
    /// Item identifier.
    pub item_id: String,
    /// Warehouse identifier.
    pub warehouse_id: String,
    /// Logical ordering key.
    pub timestamp: NaiveDateTime,
    /// Kind of movement; implies the direction.
    pub kind: MovementKind,
    /// Non-negative magnitude.
    pub quantity: Decimal,
    /// Unit cost for inflows. Ignored for outflows.
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    /// Lot number carried onto the cost layer.
    #[serde(default)]
    pub lot_number: Option<String>,
    /// Lot expiration date.
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    /// Source document number.
    #[serde(default)]
    pub document_number: Option<String>,
    /// Free-form reference.
    #[serde(default)]
    pub reference: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl MovementEvent {
    /// Create a movement with no cost or metadata.
    #[must_use]
    pub fn new(
        item_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        timestamp: NaiveDateTime,
        kind: MovementKind,
        quantity: Decimal,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            warehouse_id: warehouse_id.into(),
            timestamp,
            kind,
            quantity,
            unit_cost: None,
            lot_number: None,
            expiration_date: None,
            document_number: None,
            reference: None,
            description: None,
        }
    }

    /// Set the unit cost.
    #[must_use]
    pub const fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    /// Set the lot number.
    #[must_use]
    pub fn with_lot(mut self, lot_number: impl Into<String>) -> Self {
        self.lot_number = Some(lot_number.into());
        self
    }

    /// Set the lot expiration date.
    #[must_use]
    pub const fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// Set the document number.
    #[must_use]
    pub fn with_document(mut self, document_number: impl Into<String>) -> Self {
        self.document_number = Some(document_number.into());
        self
    }

    /// Set the reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The stream this movement belongs to.
    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        StreamId::new(self.item_id.clone(), self.warehouse_id.clone())
    }

    /// Check if this movement belongs to the given stream.
    #[must_use]
    pub fn belongs_to(&self, stream: &StreamId) -> bool {
        self.item_id == stream.item_id && self.warehouse_id == stream.warehouse_id
    }

    /// Validate the movement before any state is touched.
    ///
    /// Rejects empty identities, non-positive quantities, and inflows
    /// without a non-negative unit cost. A physical count may carry a
    /// zero quantity (an empty shelf).
    pub fn validate(&self) -> Result<(), StockError> {
        if self.item_id.trim().is_empty() {
            return Err(StockError::InvalidMovement("missing item id".to_string()));
        }
        if self.warehouse_id.trim().is_empty() {
            return Err(StockError::InvalidMovement(
                "missing warehouse id".to_string(),
            ));
        }

        match self.kind {
            MovementKind::PhysicalCount => {
                if self.quantity.is_sign_negative() && !self.quantity.is_zero() {
                    return Err(StockError::InvalidMovement(format!(
                        "counted quantity must not be negative, got {}",
                        self.quantity
                    )));
                }
            }
            _ => {
                if self.quantity <= Decimal::ZERO {
                    return Err(StockError::InvalidMovement(format!(
                        "quantity must be positive, got {}",
                        self.quantity
                    )));
                }
            }
        }

        if self.kind.is_inflow() {
            match self.unit_cost {
                None => {
                    return Err(StockError::InvalidMovement(format!(
                        "{} requires a unit cost",
                        self.kind
                    )))
                }
                Some(cost) if cost < Decimal::ZERO => {
                    return Err(StockError::InvalidMovement(format!(
                        "unit cost must not be negative, got {cost}"
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
