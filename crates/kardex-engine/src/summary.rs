//! Period summaries.
//!
//! Read-side aggregation over a ledger. Nothing here mutates state.

use chrono::NaiveDateTime;
use kardex_core::PeriodSummary;
use rust_decimal::Decimal;

use crate::Ledger;

/// Summarize a ledger over `from..=to`.
///
/// The opening state is that of the last entry strictly before `from`,
/// the closing state that of the last entry at or before `to`. Settlement
/// variances count toward the outflow value, so opening plus inflows minus
/// outflows is the closing value. When
/// nothing came in during the window the period average price falls back
/// to `current_average_cost`.
#[must_use]
pub fn summarize(
    ledger: &Ledger,
    from: NaiveDateTime,
    to: NaiveDateTime,
    current_average_cost: Decimal,
) -> PeriodSummary {
    let opening = ledger.balance_before(from);
    let closing = ledger.balance_as_of(to);
    let window = ledger.range(Some(from), Some(to));

    let mut summary = PeriodSummary {
        from,
        to,
        opening_balance: opening.balance,
        opening_value: opening.value,
        closing_balance: closing.balance,
        closing_value: closing.value,
        entry_count: window.len(),
        ..PeriodSummary::default()
    };

    for entry in window {
        if entry.quantity_in > Decimal::ZERO {
            summary.total_in += entry.quantity_in;
            summary.total_in_value += entry.total_value;
            // Stock issued against a deficit, repriced when it is settled.
            summary.total_out_value += entry.settlement_variance;
        } else {
            summary.total_out += entry.quantity_out;
            summary.total_out_value += entry.total_value;
        }
    }

    summary.cost_of_goods_consumed = summary.total_out_value;
    summary.period_average_price = if summary.total_in > Decimal::ZERO {
        summary.total_in_value / summary.total_in
    } else {
        current_average_cost
    };

    summary
}

/// An empty summary for a stream with no entries.
#[must_use]
pub fn empty(from: NaiveDateTime, to: NaiveDateTime) -> PeriodSummary {
    PeriodSummary {
        from,
        to,
        ..PeriodSummary::default()
    }
}
