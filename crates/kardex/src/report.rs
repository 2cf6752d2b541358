//! Text rendering of ledgers, summaries and cost layers.

use kardex_core::{CostLayer, LedgerEntry, PeriodSummary, StreamId};
use rust_decimal::Decimal;
use std::io::{self, Write};

use crate::ingest::Rejection;

const RULE_WIDTH: usize = 118;

fn qty(d: Decimal) -> String {
    d.normalize().to_string()
}

fn money(d: Decimal) -> String {
    format!("{d:.2}")
}

fn heading<W: Write>(writer: &mut W, title: &str) -> io::Result<()> {
    writeln!(writer, "{title}")?;
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))
}

/// Write the kardex of one stream.
pub fn write_ledger<W: Write>(
    writer: &mut W,
    stream: &StreamId,
    entries: &[LedgerEntry],
    unit: Option<&str>,
) -> io::Result<()> {
    let title = match unit {
        Some(unit) => format!("Kardex {stream} ({unit})"),
        None => format!("Kardex {stream}"),
    };
    heading(writer, &title)?;
    writeln!(
        writer,
        "{:>5}  {:<19}  {:<19}  {:>10}  {:>10}  {:>10}  {:>12}  {:>10}  {:>12}",
        "Seq", "Timestamp", "Kind", "In", "Out", "Unit cost", "Value", "Balance", "Stock value"
    )?;
    writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;

    for entry in entries {
        let flag = if entry.negative_stock { " !" } else { "" };
        writeln!(
            writer,
            "{:>5}  {:<19}  {:<19}  {:>10}  {:>10}  {:>10}  {:>12}  {:>10}  {:>12}{flag}",
            entry.sequence,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.kind.as_str(),
            qty(entry.quantity_in),
            qty(entry.quantity_out),
            money(entry.unit_cost),
            money(entry.total_value),
            qty(entry.running_balance),
            money(entry.running_value),
        )?;
    }

    if entries.iter().any(|e| e.negative_stock) {
        writeln!(writer)?;
        writeln!(writer, "! costed against negative stock")?;
    }
    Ok(())
}

/// Write a period summary.
pub fn write_summary<W: Write>(
    writer: &mut W,
    title: &str,
    summary: &PeriodSummary,
    unit: Option<&str>,
) -> io::Result<()> {
    heading(writer, title)?;
    writeln!(
        writer,
        "Period: {} .. {}",
        summary.from.format("%Y-%m-%d %H:%M:%S"),
        summary.to.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(writer)?;

    let unit = unit.map(|u| format!(" {u}")).unwrap_or_default();
    let rows = [
        ("Opening", summary.opening_balance, summary.opening_value),
        ("In", summary.total_in, summary.total_in_value),
        ("Out", summary.total_out, summary.total_out_value),
        ("Closing", summary.closing_balance, summary.closing_value),
    ];
    for (label, quantity, value) in rows {
        writeln!(
            writer,
            "  {label:<10} {:>14}{unit}  {:>16}",
            qty(quantity),
            money(value)
        )?;
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "  Cost of goods consumed: {}",
        money(summary.cost_of_goods_consumed)
    )?;
    writeln!(
        writer,
        "  Average price:          {}",
        money(summary.period_average_price)
    )?;
    writeln!(writer, "  Entries:                {}", summary.entry_count)
}

/// Write the active cost layers of one stream.
pub fn write_layers<W: Write>(
    writer: &mut W,
    stream: &StreamId,
    layers: &[CostLayer],
) -> io::Result<()> {
    heading(writer, &format!("Cost layers {stream}"))?;
    if layers.is_empty() {
        writeln!(writer, "  (none)")?;
        return Ok(());
    }

    for layer in layers {
        writeln!(
            writer,
            "  {:<19}  {:>10} @ {:>10}  {:>12}  {:<12}  {}",
            layer.received_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            qty(layer.quantity_remaining),
            money(layer.unit_cost),
            money(layer.value()),
            layer.lot_number.as_deref().unwrap_or("-"),
            layer
                .expiration_date
                .map_or_else(|| "-".to_string(), |d| d.to_string()),
        )?;
    }
    Ok(())
}

/// Write refused movements, one per line.
pub fn write_rejections<W: Write>(writer: &mut W, rejections: &[Rejection]) -> io::Result<()> {
    for rejection in rejections {
        let event = &rejection.event;
        writeln!(
            writer,
            "{} {} {} {}: {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.stream_id(),
            event.kind,
            qty(event.quantity),
            rejection.error
        )?;
    }
    Ok(())
}
