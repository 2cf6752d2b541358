//! Property-based tests for kardex-core.
//!
//! These tests verify invariants hold for arbitrary inputs using proptest.
//!
//! Run with: cargo test -p kardex-core --test `property_tests`

use chrono::{NaiveDate, NaiveDateTime};
use kardex_core::{
    CostLayer, CostLayerStore, LedgerEntry, MovementEvent, MovementKind, NegativeStockPolicy,
    StockError, ValuationMethod,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

// ============================================================================
// Arbitrary generators
// ============================================================================

fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_cost() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_method() -> impl Strategy<Value = ValuationMethod> {
    prop_oneof![
        Just(ValuationMethod::Fifo),
        Just(ValuationMethod::Lifo),
        Just(ValuationMethod::WeightedAverage),
    ]
}

fn arb_layered_method() -> impl Strategy<Value = ValuationMethod> {
    prop_oneof![Just(ValuationMethod::Fifo), Just(ValuationMethod::Lifo)]
}

#[derive(Debug, Clone)]
enum Op {
    In(Decimal, Decimal),
    Out(Decimal),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arb_quantity(), arb_cost()).prop_map(|(q, c)| Op::In(q, c)),
        arb_quantity().prop_map(Op::Out),
    ]
}

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Apply `op`, returning the signed quantity change it made.
fn apply(store: &mut CostLayerStore, op: &Op, policy: NegativeStockPolicy) -> Decimal {
    match op {
        Op::In(quantity, cost) => {
            store
                .apply_inflow(CostLayer::new(*quantity, *cost, at()))
                .unwrap();
            *quantity
        }
        Op::Out(quantity) => match store.apply_outflow(*quantity, policy) {
            Ok(used) => -used.quantity,
            Err(StockError::InsufficientStock { .. }) => Decimal::ZERO,
            Err(err) => panic!("unexpected error: {err}"),
        },
    }
}

// ============================================================================
// Cost layer store properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The balance is always the sum of accepted inflows minus outflows.
    #[test]
    fn prop_balance_is_conserved(
        method in arb_method(),
        ops in prop::collection::vec(arb_op(), 1..50),
        allow in any::<bool>(),
    ) {
        let policy = if allow { NegativeStockPolicy::Allow } else { NegativeStockPolicy::Reject };
        let mut store = CostLayerStore::new(method);
        let mut expected = Decimal::ZERO;

        for op in &ops {
            expected += apply(&mut store, op, policy);
            prop_assert_eq!(store.current_balance(), expected);
        }
    }

    /// Under a rejecting policy the balance never goes below zero.
    #[test]
    fn prop_reject_never_goes_negative(
        method in arb_method(),
        ops in prop::collection::vec(arb_op(), 1..50),
    ) {
        let mut store = CostLayerStore::new(method);
        for op in &ops {
            let before = store.clone();
            let change = apply(&mut store, op, NegativeStockPolicy::Reject);
            prop_assert!(!store.is_negative());
            if change.is_zero() {
                // Rejected outflows leave every field untouched
                prop_assert_eq!(&store, &before);
            }
        }
    }

    /// Cached balance and value agree with the layers themselves.
    #[test]
    fn prop_layer_cache_matches_layers(
        method in arb_layered_method(),
        ops in prop::collection::vec(arb_op(), 1..50),
    ) {
        let mut store = CostLayerStore::new(method);
        for op in &ops {
            apply(&mut store, op, NegativeStockPolicy::Reject);
            let (quantity, value) = store.layer_totals();
            prop_assert_eq!(quantity, store.current_balance());
            prop_assert_eq!(value, store.current_value());
            prop_assert!(store.layers().iter().all(|l| !l.is_empty()));
        }
    }

    /// With inflows only, the moving average is exactly value / balance.
    #[test]
    fn prop_average_after_inflows(
        inflows in prop::collection::vec((arb_quantity(), arb_cost()), 1..30),
    ) {
        let mut store = CostLayerStore::new(ValuationMethod::WeightedAverage);
        let mut quantity = Decimal::ZERO;
        let mut value = Decimal::ZERO;

        for (q, c) in &inflows {
            store.apply_inflow(CostLayer::new(*q, *c, at())).unwrap();
            quantity += *q;
            value += *q * *c;
        }

        prop_assert_eq!(store.current_balance(), quantity);
        prop_assert_eq!(store.current_value(), value);
        prop_assert_eq!(store.average_cost(), value / quantity);
    }

    /// Outflows never move the moving average.
    #[test]
    fn prop_outflows_keep_average(
        inflows in prop::collection::vec((arb_quantity(), arb_cost()), 1..10),
        outflows in prop::collection::vec(arb_quantity(), 1..10),
    ) {
        let mut store = CostLayerStore::new(ValuationMethod::WeightedAverage);
        for (q, c) in &inflows {
            store.apply_inflow(CostLayer::new(*q, *c, at())).unwrap();
        }
        let average = store.average_cost();

        for q in &outflows {
            if store.apply_outflow(*q, NegativeStockPolicy::Reject).is_ok()
                && !store.current_balance().is_zero()
            {
                prop_assert_eq!(store.average_cost(), average);
            }
        }
    }

    /// Layered issue costs lie between the cheapest and dearest layer.
    #[test]
    fn prop_layered_cost_is_bounded(
        first in (arb_quantity(), arb_cost()),
        second in (arb_quantity(), arb_cost()),
        take in arb_quantity(),
    ) {
        let total = first.0 + second.0;
        prop_assume!(take <= total);

        let mut costs = Vec::new();
        for method in [ValuationMethod::Fifo, ValuationMethod::Lifo] {
            let mut store = CostLayerStore::new(method);
            store.apply_inflow(CostLayer::new(first.0, first.1, at())).unwrap();
            store.apply_inflow(CostLayer::new(second.0, second.1, at())).unwrap();
            costs.push(store.apply_outflow(take, NegativeStockPolicy::Reject).unwrap().total_cost);
        }

        let low = first.1.min(second.1) * take;
        let high = first.1.max(second.1) * take;
        for cost in costs {
            prop_assert!(cost >= low && cost <= high);
        }
    }
}

// ============================================================================
// Movement properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every kind parses back from its external name.
    #[test]
    fn prop_kind_names_parse(index in 0usize..MovementKind::ALL.len()) {
        let kind = MovementKind::ALL[index];
        prop_assert_eq!(kind.as_str().parse::<MovementKind>().unwrap(), kind);
        prop_assert_eq!(
            kind.as_str().to_uppercase().replace('_', "-").parse::<MovementKind>().unwrap(),
            kind
        );
    }

    /// Ledger entries carry the store state they were built from.
    #[test]
    fn prop_entry_reflects_store(
        method in arb_method(),
        quantity in arb_quantity(),
        cost in arb_cost(),
    ) {
        let mut store = CostLayerStore::new(method);
        let intake = store.apply_inflow(CostLayer::new(quantity, cost, at())).unwrap();

        let event = MovementEvent::new("i", "w", at(), MovementKind::Receipt, quantity)
            .with_unit_cost(cost);
        let entry = LedgerEntry::inflow(&event, 1, intake, &store);

        prop_assert_eq!(entry.running_balance, store.current_balance());
        prop_assert_eq!(entry.running_value, store.current_value());
        prop_assert_eq!(entry.total_value, quantity * cost);
        prop_assert_eq!(entry.net_quantity(), quantity);
    }
}
