//! Cost layer types.
//!
//! A [`CostLayer`] is a still-unconsumed inflow: a quantity held at the unit
//! cost it entered with. FIFO and LIFO keep an ordered sequence of layers.
//!
//! A [`ConsumedLayer`] records the part of a layer an outflow drew from, so
//! ledger entries can be traced back to the lots they consumed.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An active cost layer.
///
/// # Examples
///
/// ```
/// use kardex_core::CostLayer;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let at = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(8, 0, 0).unwrap();
/// let layer = CostLayer::new(dec!(10), dec!(150.00), at).with_lot("L-1");
///
/// assert_eq!(layer.value(), dec!(1500.00));
/// assert_eq!(layer.lot_number.as_deref(), Some("L-1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CostLayer {
    /// Quantity not yet consumed.
    pub quantity_remaining: Decimal,
    /// Cost per unit
    pub unit_cost: Decimal,
    /// When the inflow that created this layer happened.
    pub received_at: NaiveDateTime,
    /// Lot number (optional)
    pub lot_number: Option<String>,
    /// Lot expiration date (optional)
    pub expiration_date: Option<NaiveDate>,
}

impl CostLayer {
    /// Create a new layer.
    #[must_use]
    pub const fn new(quantity: Decimal, unit_cost: Decimal, received_at: NaiveDateTime) -> Self {
        Self {
            quantity_remaining: quantity,
            unit_cost,
            received_at,
            lot_number: None,
            expiration_date: None,
        }
    }

    /// Add a lot number to this layer.
    #[must_use]
    pub fn with_lot(mut self, lot_number: impl Into<String>) -> Self {
        self.lot_number = Some(lot_number.into());
        self
    }

    /// Add an expiration date to this layer.
    #[must_use]
    pub const fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// Value held in this layer.
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.quantity_remaining * self.unit_cost
    }

    /// Check if the layer has been fully consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantity_remaining.is_zero()
    }

    /// Check if the layer expires on or before the given date.
    #[must_use]
    pub fn expires_by(&self, date: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|d| d <= date)
    }

    /// Take up to `quantity` from this layer.
    ///
    /// Returns the part taken; the layer keeps the rest.
    pub fn take(&mut self, quantity: Decimal) -> ConsumedLayer {
        let taken = quantity.min(self.quantity_remaining);
        self.quantity_remaining -= taken;
        ConsumedLayer {
            quantity: taken,
            unit_cost: self.unit_cost,
            received_at: Some(self.received_at),
            lot_number: self.lot_number.clone(),
        }
    }
}

impl fmt::Display for CostLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} @ {}, {}",
            self.quantity_remaining,
            self.unit_cost,
            self.received_at.date()
        )?;
        if let Some(lot) = &self.lot_number {
            write!(f, ", \"{lot}\"")?;
        }
        write!(f, "}}")
    }
}

/// The part of a cost basis drawn by one outflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumedLayer {
    /// Quantity drawn.
    pub quantity: Decimal,
    /// Unit cost it was drawn at.
    pub unit_cost: Decimal,
    /// Receipt time of the source layer. `None` for average-cost and
    /// negative-stock draws, which have no single source layer.
    pub received_at: Option<NaiveDateTime>,
    /// Lot of the source layer.
    pub lot_number: Option<String>,
}

impl ConsumedLayer {
    /// A draw not tied to a specific layer.
    #[must_use]
    pub const fn pooled(quantity: Decimal, unit_cost: Decimal) -> Self {
        Self {
            quantity,
            unit_cost,
            received_at: None,
            lot_number: None,
        }
    }

    /// Value drawn.
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.quantity * self.unit_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_take_partial() {
        let mut layer = CostLayer::new(dec!(10), dec!(100), at(1)).with_lot("A");
        let taken = layer.take(dec!(4));

        assert_eq!(taken.quantity, dec!(4));
        assert_eq!(taken.value(), dec!(400));
        assert_eq!(taken.lot_number.as_deref(), Some("A"));
        assert_eq!(layer.quantity_remaining, dec!(6));
        assert!(!layer.is_empty());
    }

    #[test]
    fn test_take_more_than_available() {
        let mut layer = CostLayer::new(dec!(3), dec!(100), at(1));
        let taken = layer.take(dec!(5));

        assert_eq!(taken.quantity, dec!(3));
        assert!(layer.is_empty());
    }

    #[test]
    fn test_expires_by() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let layer = CostLayer::new(dec!(1), dec!(1), at(1)).with_expiration(date);

        assert!(layer.expires_by(date));
        assert!(!layer.expires_by(date.pred_opt().unwrap()));
        assert!(!CostLayer::new(dec!(1), dec!(1), at(1)).expires_by(date));
    }

    #[test]
    fn test_display() {
        let layer = CostLayer::new(dec!(10), dec!(1.50), at(2)).with_lot("L7");
        assert_eq!(format!("{layer}"), "{10 @ 1.50, 2024-01-02, \"L7\"}");
    }
}
