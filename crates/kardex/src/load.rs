//! Movement loading from CSV and JSON files.
//!
//! CSV files need a header row. Required columns are `item`, `warehouse`,
//! `timestamp` (or `date`), `kind` and `quantity`; `unit_cost`, `lot`,
//! `expiration`, `document`, `reference` and `description` are optional.
//!
//! JSON files hold an array of movement objects using the field names of
//! [`MovementEvent`].

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use kardex_core::{MovementEvent, MovementKind};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Movements read from a file, with the rows that could not be read.
#[derive(Debug, Default)]
pub struct Loaded {
    /// Movements in file order.
    pub movements: Vec<MovementEvent>,
    /// One message per unreadable row.
    pub warnings: Vec<String>,
}

/// Load movements from a file, choosing the format by extension.
pub fn load_file(path: &Path) -> Result<Loaded> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        parse_json(&content).with_context(|| format!("failed to parse {}", path.display()))
    } else {
        parse_csv(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Parse a JSON array of movements.
pub fn parse_json(content: &str) -> Result<Loaded> {
    let movements: Vec<MovementEvent> = serde_json::from_str(content)?;
    Ok(Loaded {
        movements,
        warnings: Vec::new(),
    })
}

/// Parse CSV movements.
pub fn parse_csv(content: &str) -> Result<Loaded> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let header_map: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_lowercase(), i))
        .collect();

    let columns = Columns::resolve(&header_map)?;
    let mut loaded = Loaded::default();

    for (i, result) in reader.records().enumerate() {
        let row_num = i + 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                loaded.warnings.push(format!("Row {row_num}: parse error: {e}"));
                continue;
            }
        };

        if record.iter().all(str::is_empty) {
            continue;
        }

        match columns.parse_row(&record) {
            Ok(event) => loaded.movements.push(event),
            Err(e) => loaded.warnings.push(format!("Row {row_num}: {e:#}")),
        }
    }

    Ok(loaded)
}

/// Column positions of a CSV file.
struct Columns {
    item: usize,
    warehouse: usize,
    timestamp: usize,
    kind: usize,
    quantity: usize,
    unit_cost: Option<usize>,
    lot: Option<usize>,
    expiration: Option<usize>,
    document: Option<usize>,
    reference: Option<usize>,
    description: Option<usize>,
}

impl Columns {
    fn resolve(header_map: &HashMap<String, usize>) -> Result<Self> {
        let find = |names: &[&str]| names.iter().find_map(|n| header_map.get(*n).copied());
        let require = |names: &[&str]| {
            find(names).with_context(|| format!("column '{}' not found in header", names[0]))
        };

        Ok(Self {
            item: require(&["item", "item_id"])?,
            warehouse: require(&["warehouse", "warehouse_id"])?,
            timestamp: require(&["timestamp", "date"])?,
            kind: require(&["kind", "type"])?,
            quantity: require(&["quantity", "qty"])?,
            unit_cost: find(&["unit_cost", "cost"]),
            lot: find(&["lot", "lot_number"]),
            expiration: find(&["expiration", "expiration_date"]),
            document: find(&["document", "document_number"]),
            reference: find(&["reference"]),
            description: find(&["description"]),
        })
    }

    fn parse_row(&self, record: &csv::StringRecord) -> Result<MovementEvent> {
        let get = |index: usize| record.get(index).unwrap_or_default();
        let optional = |index: Option<usize>| {
            index
                .map(get)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let timestamp = parse_timestamp(get(self.timestamp))
            .with_context(|| format!("invalid timestamp '{}'", get(self.timestamp)))?;
        let kind = MovementKind::from_str(get(self.kind))?;
        let quantity = Decimal::from_str(get(self.quantity))
            .with_context(|| format!("invalid quantity '{}'", get(self.quantity)))?;

        let mut event = MovementEvent::new(
            get(self.item),
            get(self.warehouse),
            timestamp,
            kind,
            quantity,
        );

        if let Some(cost) = optional(self.unit_cost) {
            event.unit_cost = Some(
                Decimal::from_str(&cost).with_context(|| format!("invalid unit cost '{cost}'"))?,
            );
        }
        if let Some(date) = optional(self.expiration) {
            event.expiration_date = Some(
                NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .with_context(|| format!("invalid expiration date '{date}'"))?,
            );
        }
        event.lot_number = optional(self.lot);
        event.document_number = optional(self.document);
        event.reference = optional(self.reference);
        event.description = optional(self.description);

        Ok(event)
    }
}

/// Parse a timestamp. A bare date means midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Parse the end of a report window. A bare date means the end of that day.
pub fn parse_window_end(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(23, 59, 59),
        Err(_) => parse_timestamp(s),
    }
}
