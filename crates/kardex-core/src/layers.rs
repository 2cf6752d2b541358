//! Per-stream cost state.
//!
//! A [`CostLayerStore`] holds the cost basis of one stream. FIFO and LIFO
//! keep an ordered sequence of [`CostLayer`]s; weighted average keeps a
//! single bucket. Balance and value are cached incrementally so reading
//! them never walks the layers.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::{ConsumedLayer, CostLayer, NegativeStockPolicy, StockError, ValuationMethod};

/// Result of applying an inflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intake {
    /// Quantity that entered the stream.
    pub quantity: Decimal,
    /// Value that entered with it.
    pub total_cost: Decimal,
    /// Part of the quantity that covered a negative balance.
    pub settled: Decimal,
    /// Value written off when a negative balance is settled at the inflow
    /// cost: the value before plus `total_cost`, minus the value after.
    pub variance: Decimal,
}

impl Intake {
    /// Check if the inflow settled a negative balance.
    #[must_use]
    pub fn is_settlement(&self) -> bool {
        self.settled > Decimal::ZERO
    }
}

/// Result of applying an outflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumption {
    /// Quantity that left the stream.
    pub quantity: Decimal,
    /// Value that left the stream.
    pub total_cost: Decimal,
    /// `total_cost / quantity`.
    pub unit_cost: Decimal,
    /// Layers (or pooled draws) the outflow was costed against.
    pub layers: Vec<ConsumedLayer>,
    /// Quantity beyond the available balance, costed at the last known cost.
    pub shortfall: Decimal,
}

impl Consumption {
    /// Check if part of the outflow was drawn against a negative balance.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.shortfall > Decimal::ZERO
    }
}

fn overflow() -> StockError {
    StockError::InvalidMovement("arithmetic overflow".to_string())
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal, StockError> {
    a.checked_add(b).ok_or_else(overflow)
}

fn sub(a: Decimal, b: Decimal) -> Result<Decimal, StockError> {
    a.checked_sub(b).ok_or_else(overflow)
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, StockError> {
    a.checked_mul(b).ok_or_else(overflow)
}

/// `value / quantity`, zero for a zero quantity.
fn unit(value: Decimal, quantity: Decimal) -> Result<Decimal, StockError> {
    if quantity.is_zero() {
        Ok(Decimal::ZERO)
    } else {
        value.checked_div(quantity).ok_or_else(overflow)
    }
}

/// Cost state for one stream.
///
/// # Examples
///
/// ```
/// use kardex_core::{CostLayer, CostLayerStore, NegativeStockPolicy, ValuationMethod};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let at = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let mut store = CostLayerStore::new(ValuationMethod::Fifo);
/// store.apply_inflow(CostLayer::new(dec!(10), dec!(100), at)).unwrap();
/// store.apply_inflow(CostLayer::new(dec!(10), dec!(200), at)).unwrap();
///
/// let used = store.apply_outflow(dec!(12), NegativeStockPolicy::Reject).unwrap();
/// assert_eq!(used.total_cost, dec!(1400)); // 10 * 100 + 2 * 200
/// assert_eq!(store.current_balance(), dec!(8));
/// assert_eq!(store.current_value(), dec!(1600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLayerStore {
    method: ValuationMethod,
    layers: VecDeque<CostLayer>,
    quantity: Decimal,
    value: Decimal,
    average_cost: Decimal,
    last_unit_cost: Decimal,
}

impl CostLayerStore {
    /// Create an empty store for the given method.
    #[must_use]
    pub const fn new(method: ValuationMethod) -> Self {
        Self {
            method,
            layers: VecDeque::new(),
            quantity: Decimal::ZERO,
            value: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            last_unit_cost: Decimal::ZERO,
        }
    }

    /// The method this store currently values with.
    #[must_use]
    pub const fn method(&self) -> ValuationMethod {
        self.method
    }

    /// Active layers, oldest first. Always empty under weighted average.
    #[must_use]
    pub const fn layers(&self) -> &VecDeque<CostLayer> {
        &self.layers
    }

    /// Quantity on hand. Negative only under an allowing policy.
    #[must_use]
    pub const fn current_balance(&self) -> Decimal {
        self.quantity
    }

    /// Value on hand.
    #[must_use]
    pub const fn current_value(&self) -> Decimal {
        self.value
    }

    /// Check if the balance is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.quantity < Decimal::ZERO
    }

    /// Check if nothing has ever entered this store or everything has left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero() && self.layers.is_empty()
    }

    /// Current unit cost. Zero when the balance is zero.
    ///
    /// Weighted average returns the stored moving average, which only
    /// inflows change. Layered methods return `value / balance`.
    #[must_use]
    pub fn average_cost(&self) -> Decimal {
        if self.method.is_layered() {
            // Every mutation checks this quotient before committing.
            unit(self.value, self.quantity).unwrap_or_default()
        } else if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.average_cost
        }
    }

    /// Cost used when no layer is left to draw from.
    fn fallback_cost(&self) -> Decimal {
        if !self.method.is_layered() && !self.average_cost.is_zero() {
            self.average_cost
        } else {
            self.last_unit_cost
        }
    }

    /// Add stock.
    ///
    /// FIFO/LIFO append the layer; weighted average folds it into the
    /// bucket and recomputes the average. Entering from a negative balance
    /// settles the deficit at the inflow cost and restarts the store from
    /// the remaining quantity; the revaluation is reported as
    /// [`Intake::variance`].
    ///
    /// Nothing changes if the inflow is invalid or the new totals overflow.
    pub fn apply_inflow(&mut self, layer: CostLayer) -> Result<Intake, StockError> {
        if layer.quantity_remaining <= Decimal::ZERO {
            return Err(StockError::InvalidMovement(format!(
                "inflow quantity must be positive, got {}",
                layer.quantity_remaining
            )));
        }
        if layer.unit_cost < Decimal::ZERO {
            return Err(StockError::InvalidMovement(format!(
                "unit cost must not be negative, got {}",
                layer.unit_cost
            )));
        }

        let unit_cost = layer.unit_cost;
        let received = layer.quantity_remaining;
        let total_cost = mul(received, unit_cost)?;
        let quantity = add(self.quantity, received)?;

        if self.is_negative() {
            let value = mul(quantity, unit_cost)?;
            let variance = sub(add(self.value, total_cost)?, value)?;
            let settled = received.min(-self.quantity);

            self.layers.clear();
            if quantity > Decimal::ZERO && self.method.is_layered() {
                self.layers.push_back(CostLayer {
                    quantity_remaining: quantity,
                    ..layer
                });
            }
            self.quantity = quantity;
            self.value = value;
            self.average_cost = unit_cost;
            self.last_unit_cost = unit_cost;

            return Ok(Intake {
                quantity: received,
                total_cost,
                settled,
                variance,
            });
        }

        let value = add(self.value, total_cost)?;
        let average = unit(value, quantity)?;

        if self.method.is_layered() {
            self.layers.push_back(layer);
        } else {
            self.average_cost = average;
        }
        self.quantity = quantity;
        self.value = value;
        self.last_unit_cost = unit_cost;

        Ok(Intake {
            quantity: received,
            total_cost,
            settled: Decimal::ZERO,
            variance: Decimal::ZERO,
        })
    }

    /// Remove stock and report the cost basis that left with it.
    ///
    /// Under [`NegativeStockPolicy::Reject`] an outflow larger than the
    /// balance fails with [`StockError::InsufficientStock`]. The cost is
    /// worked out before any layer is touched, so a failure leaves the
    /// store unchanged.
    pub fn apply_outflow(
        &mut self,
        quantity: Decimal,
        policy: NegativeStockPolicy,
    ) -> Result<Consumption, StockError> {
        if quantity <= Decimal::ZERO {
            return Err(StockError::InvalidMovement(format!(
                "outflow quantity must be positive, got {quantity}"
            )));
        }

        let available = self.quantity.max(Decimal::ZERO);
        if quantity > available && !policy.allows_negative() {
            return Err(StockError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        let (total_cost, shortfall_cost) = match self.method {
            ValuationMethod::Fifo | ValuationMethod::Lifo => self.layered_cost(quantity)?,
            ValuationMethod::WeightedAverage => (self.average_total(quantity)?, self.fallback_cost()),
        };
        let unit_cost = unit(total_cost, quantity)?;
        let next_quantity = sub(self.quantity, quantity)?;
        let next_value = sub(self.value, total_cost)?;
        unit(next_value, next_quantity)?;

        let shortfall = (quantity - available).max(Decimal::ZERO);
        let layers = match self.method {
            ValuationMethod::Fifo | ValuationMethod::Lifo => {
                self.take_layers(quantity, shortfall, shortfall_cost)
            }
            ValuationMethod::WeightedAverage => {
                vec![ConsumedLayer::pooled(quantity, shortfall_cost)]
            }
        };
        self.quantity = next_quantity;
        self.value = next_value;

        Ok(Consumption {
            quantity,
            total_cost,
            unit_cost,
            layers,
            shortfall,
        })
    }

    /// Layers in the order an outflow draws them.
    fn draw_order(&self) -> Box<dyn Iterator<Item = &CostLayer> + '_> {
        match self.method {
            ValuationMethod::Lifo => Box::new(self.layers.iter().rev()),
            _ => Box::new(self.layers.iter()),
        }
    }

    /// Cost of drawing `quantity` from the layers, and the unit cost any
    /// shortfall is charged at.
    fn layered_cost(&self, quantity: Decimal) -> Result<(Decimal, Decimal), StockError> {
        let mut remaining = quantity;
        let mut total_cost = Decimal::ZERO;
        let mut last_cost = None;

        for layer in self.draw_order() {
            if remaining <= Decimal::ZERO {
                break;
            }
            let taken = remaining.min(layer.quantity_remaining);
            total_cost = add(total_cost, mul(taken, layer.unit_cost)?)?;
            remaining -= taken;
            last_cost = Some(layer.unit_cost);
        }

        let shortfall_cost = last_cost.unwrap_or_else(|| self.fallback_cost());
        if remaining > Decimal::ZERO {
            total_cost = add(total_cost, mul(remaining, shortfall_cost)?)?;
        }
        Ok((total_cost, shortfall_cost))
    }

    /// Consume from the head (FIFO) or tail (LIFO) of the layer sequence.
    fn take_layers(
        &mut self,
        quantity: Decimal,
        shortfall: Decimal,
        shortfall_cost: Decimal,
    ) -> Vec<ConsumedLayer> {
        let mut remaining = quantity - shortfall;
        let mut layers = Vec::new();

        while remaining > Decimal::ZERO {
            let layer = match self.method {
                ValuationMethod::Lifo => self.layers.back_mut(),
                _ => self.layers.front_mut(),
            };
            let Some(layer) = layer else {
                break;
            };

            let part = layer.take(remaining);
            let exhausted = layer.is_empty();
            remaining -= part.quantity;
            layers.push(part);

            if exhausted {
                match self.method {
                    ValuationMethod::Lifo => self.layers.pop_back(),
                    _ => self.layers.pop_front(),
                };
            }
        }

        if shortfall > Decimal::ZERO {
            layers.push(ConsumedLayer::pooled(shortfall, shortfall_cost));
        }
        layers
    }

    /// Value of `quantity` at the moving average. The average itself is not
    /// touched.
    fn average_total(&self, quantity: Decimal) -> Result<Decimal, StockError> {
        // Emptying the bucket takes whatever value is left so no residue remains.
        if quantity == self.quantity {
            Ok(self.value)
        } else {
            mul(quantity, self.fallback_cost())
        }
    }

    /// Change the valuation method for subsequent movements.
    ///
    /// Layers collapse into one bucket when switching to weighted average;
    /// a bucket becomes a single layer at the average cost, received at
    /// `at`, when switching to FIFO/LIFO.
    pub fn switch_method(
        &mut self,
        method: ValuationMethod,
        at: NaiveDateTime,
    ) -> Result<(), StockError> {
        if method == self.method {
            return Ok(());
        }

        match (self.method.is_layered(), method.is_layered()) {
            (true, false) => {
                self.average_cost = if self.quantity > Decimal::ZERO {
                    unit(self.value, self.quantity)?
                } else {
                    self.last_unit_cost
                };
                self.layers.clear();
            }
            (false, true) => {
                if self.quantity > Decimal::ZERO {
                    let layer = CostLayer::new(self.quantity, self.average_cost, at);
                    let value = mul(self.quantity, self.average_cost)?;
                    unit(value, self.quantity)?;
                    self.value = value;
                    self.layers.push_back(layer);
                }
            }
            _ => {}
        }

        self.method = method;
        Ok(())
    }

    /// Layers with an expiration date on or before `date`.
    #[must_use]
    pub fn expiring(&self, date: NaiveDate) -> Vec<&CostLayer> {
        self.layers.iter().filter(|l| l.expires_by(date)).collect()
    }

    /// Sum quantity and value over the layers. O(layers); for audits only.
    #[must_use]
    pub fn layer_totals(&self) -> (Decimal, Decimal) {
        self.layers.iter().fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(quantity, value), layer| (quantity + layer.quantity_remaining, value + layer.value()),
        )
    }
}

impl fmt::Display for CostLayerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} = {}", self.method, self.quantity, self.value)?;
        if !self.layers.is_empty() {
            write!(f, " [")?;
            for (i, layer) in self.layers.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{layer}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
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

    fn store_with(method: ValuationMethod, lots: &[(Decimal, Decimal)]) -> CostLayerStore {
        let mut store = CostLayerStore::new(method);
        for (i, (quantity, cost)) in lots.iter().enumerate() {
            store
                .apply_inflow(CostLayer::new(*quantity, *cost, at(i as u32 + 1)))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_empty_store() {
        let store = CostLayerStore::new(ValuationMethod::Fifo);
        assert!(store.is_empty());
        assert_eq!(store.current_balance(), dec!(0));
        assert_eq!(store.average_cost(), dec!(0));
    }

    #[test]
    fn test_fifo_consumes_oldest_first() {
        let mut store = store_with(
            ValuationMethod::Fifo,
            &[(dec!(10), dec!(100)), (dec!(10), dec!(200))],
        );

        let used = store
            .apply_outflow(dec!(12), NegativeStockPolicy::Reject)
            .unwrap();

        assert_eq!(used.total_cost, dec!(1400));
        assert_eq!(used.unit_cost.round_dp(2), dec!(116.67));
        assert_eq!(used.layers.len(), 2);
        assert_eq!(store.layers().len(), 1);
        assert_eq!(store.layers()[0].quantity_remaining, dec!(8));
        assert_eq!(store.layers()[0].unit_cost, dec!(200));
    }

    #[test]
    fn test_lifo_consumes_newest_first() {
        let mut store = store_with(
            ValuationMethod::Lifo,
            &[(dec!(10), dec!(100)), (dec!(10), dec!(200))],
        );

        let used = store
            .apply_outflow(dec!(12), NegativeStockPolicy::Reject)
            .unwrap();

        assert_eq!(used.total_cost, dec!(2200));
        assert_eq!(used.unit_cost.round_dp(2), dec!(183.33));
        assert_eq!(store.current_value(), dec!(800));
        assert_eq!(store.layers()[0].unit_cost, dec!(100));
    }

    #[test]
    fn test_fully_consumed_layer_is_removed() {
        let mut store = store_with(
            ValuationMethod::Fifo,
            &[(dec!(5), dec!(10)), (dec!(5), dec!(20))],
        );
        store
            .apply_outflow(dec!(5), NegativeStockPolicy::Reject)
            .unwrap();

        assert_eq!(store.layers().len(), 1);
        assert_eq!(store.layer_totals(), (dec!(5), dec!(100)));
    }

    #[test]
    fn test_weighted_average_recomputed_on_inflow_only() {
        let mut store = store_with(
            ValuationMethod::WeightedAverage,
            &[(dec!(5), dec!(1000)), (dec!(5), dec!(1200))],
        );
        assert_eq!(store.average_cost(), dec!(1100));
        assert_eq!(store.current_value(), dec!(11000));

        let used = store
            .apply_outflow(dec!(8), NegativeStockPolicy::Reject)
            .unwrap();

        assert_eq!(used.unit_cost, dec!(1100));
        assert_eq!(used.total_cost, dec!(8800));
        assert_eq!(store.current_balance(), dec!(2));
        assert_eq!(store.current_value(), dec!(2200));
        assert_eq!(store.average_cost(), dec!(1100));
        assert!(store.layers().is_empty());
    }

    #[test]
    fn test_weighted_average_depletion_leaves_no_value() {
        let mut store = store_with(
            ValuationMethod::WeightedAverage,
            &[(dec!(3), dec!(1)), (dec!(3), dec!(2)), (dec!(1), dec!(2))],
        );
        store
            .apply_outflow(dec!(2), NegativeStockPolicy::Reject)
            .unwrap();
        store
            .apply_outflow(dec!(5), NegativeStockPolicy::Reject)
            .unwrap();

        assert_eq!(store.current_balance(), dec!(0));
        assert_eq!(store.current_value(), dec!(0));
        assert_eq!(store.average_cost(), dec!(0));
    }

    #[test]
    fn test_insufficient_stock_leaves_store_untouched() {
        let mut store = store_with(ValuationMethod::Fifo, &[(dec!(10), dec!(150))]);
        let before = store.clone();

        let result = store.apply_outflow(dec!(15), NegativeStockPolicy::Reject);

        assert_eq!(
            result,
            Err(StockError::InsufficientStock {
                requested: dec!(15),
                available: dec!(10),
            })
        );
        assert_eq!(store, before);
    }

    #[test]
    fn test_outflow_from_empty_store_rejected() {
        let mut store = CostLayerStore::new(ValuationMethod::WeightedAverage);
        assert!(matches!(
            store.apply_outflow(dec!(1), NegativeStockPolicy::Reject),
            Err(StockError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_negative_stock_uses_last_layer_cost() {
        let mut store = store_with(ValuationMethod::Fifo, &[(dec!(4), dec!(10))]);

        let used = store
            .apply_outflow(dec!(6), NegativeStockPolicy::Allow)
            .unwrap();

        assert!(used.is_short());
        assert_eq!(used.shortfall, dec!(2));
        assert_eq!(used.total_cost, dec!(60));
        assert_eq!(store.current_balance(), dec!(-2));
        assert_eq!(store.current_value(), dec!(-20));
        assert!(store.is_negative());
    }

    #[test]
    fn test_inflow_settles_negative_balance() {
        let mut store = store_with(ValuationMethod::Fifo, &[(dec!(4), dec!(10))]);
        store
            .apply_outflow(dec!(6), NegativeStockPolicy::Allow)
            .unwrap();

        let intake = store
            .apply_inflow(CostLayer::new(dec!(5), dec!(12), at(9)))
            .unwrap();

        assert_eq!(store.current_balance(), dec!(3));
        assert_eq!(store.current_value(), dec!(36));
        assert_eq!(store.layer_totals(), (dec!(3), dec!(36)));

        // -20 + 60 = 40 before revaluing the two missing units at 12
        assert!(intake.is_settlement());
        assert_eq!(intake.settled, dec!(2));
        assert_eq!(intake.total_cost, dec!(60));
        assert_eq!(intake.variance, dec!(4));
    }

    #[test]
    fn test_plain_inflow_is_not_a_settlement() {
        let mut store = CostLayerStore::new(ValuationMethod::WeightedAverage);
        let intake = store
            .apply_inflow(CostLayer::new(dec!(4), dec!(2.5), at(1)))
            .unwrap();

        assert!(!intake.is_settlement());
        assert_eq!(intake.total_cost, dec!(10));
        assert_eq!(intake.variance, dec!(0));
    }

    #[test]
    fn test_weighted_average_negative_tail() {
        let mut store = store_with(ValuationMethod::WeightedAverage, &[(dec!(2), dec!(50))]);
        let used = store
            .apply_outflow(dec!(3), NegativeStockPolicy::Allow)
            .unwrap();

        assert_eq!(used.unit_cost, dec!(50));
        assert_eq!(used.shortfall, dec!(1));
        assert_eq!(store.current_balance(), dec!(-1));
        assert_eq!(store.average_cost(), dec!(50));
    }

    #[test]
    fn test_switch_layers_to_average() {
        let mut store = store_with(
            ValuationMethod::Fifo,
            &[(dec!(10), dec!(100)), (dec!(10), dec!(200))],
        );
        store
            .switch_method(ValuationMethod::WeightedAverage, at(10))
            .unwrap();

        assert!(store.layers().is_empty());
        assert_eq!(store.average_cost(), dec!(150));
        assert_eq!(store.current_value(), dec!(3000));
    }

    #[test]
    fn test_switch_average_to_layers() {
        let mut store = store_with(
            ValuationMethod::WeightedAverage,
            &[(dec!(5), dec!(1000)), (dec!(5), dec!(1200))],
        );
        store
            .switch_method(ValuationMethod::Lifo, at(10))
            .unwrap();

        assert_eq!(store.layers().len(), 1);
        assert_eq!(store.layers()[0].unit_cost, dec!(1100));
        assert_eq!(store.layer_totals(), (dec!(10), dec!(11000)));
    }

    #[test]
    fn test_rejects_bad_inflow() {
        let mut store = CostLayerStore::new(ValuationMethod::Fifo);
        assert!(store
            .apply_inflow(CostLayer::new(dec!(0), dec!(1), at(1)))
            .is_err());
        assert!(store
            .apply_inflow(CostLayer::new(dec!(1), dec!(-1), at(1)))
            .is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_overflowing_inflow_leaves_store_untouched() {
        for method in [
            ValuationMethod::Fifo,
            ValuationMethod::Lifo,
            ValuationMethod::WeightedAverage,
        ] {
            let mut store = store_with(method, &[(dec!(1), Decimal::MAX)]);
            let before = store.clone();

            let result = store.apply_inflow(CostLayer::new(dec!(1), dec!(1), at(2)));

            assert_eq!(
                result,
                Err(StockError::InvalidMovement("arithmetic overflow".to_string())),
                "{method}"
            );
            assert_eq!(store, before, "{method}");
            assert_eq!(store.current_balance(), dec!(1));
            assert_eq!(store.current_value(), Decimal::MAX);
        }
    }

    #[test]
    fn test_overflowing_layer_value_is_rejected() {
        let mut store = CostLayerStore::new(ValuationMethod::Fifo);
        let result = store.apply_inflow(CostLayer::new(dec!(2), Decimal::MAX, at(1)));

        assert!(matches!(result, Err(StockError::InvalidMovement(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_overflowing_shortfall_leaves_store_untouched() {
        let mut store = store_with(
            ValuationMethod::Fifo,
            &[(dec!(1), dec!(0)), (dec!(1), Decimal::MAX)],
        );
        let before = store.clone();

        // Draws both layers, then one more unit at the last layer's cost.
        let result = store.apply_outflow(dec!(3), NegativeStockPolicy::Allow);

        assert!(matches!(result, Err(StockError::InvalidMovement(_))));
        assert_eq!(store, before);
        assert_eq!(store.layers().len(), 2);
    }

    #[test]
    fn test_expiring_layers() {
        let mut store = CostLayerStore::new(ValuationMethod::Fifo);
        let soon = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        store
            .apply_inflow(CostLayer::new(dec!(1), dec!(1), at(1)).with_expiration(soon))
            .unwrap();
        store
            .apply_inflow(CostLayer::new(dec!(1), dec!(1), at(2)).with_expiration(later))
            .unwrap();

        assert_eq!(store.expiring(soon).len(), 1);
        assert_eq!(store.expiring(later).len(), 2);
    }
}
