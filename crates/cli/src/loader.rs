use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use demand_core::{engine::aggregation::validate_record, SalesRecord, ValidationError};
use tracing::debug;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Required columns and the alternative header names accepted for each.
const COLUMNS: [(&str, &[&str]); 4] = [
    ("store_id", &["store_id", "store_name", "store"]),
    ("product_id", &["product_id", "product_name", "product", "sku"]),
    ("date", &["date", "sale_date"]),
    ("quantity_sold", &["quantity_sold", "quantity", "qty_sold"]),
];

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    store: usize,
    product: usize,
    date: usize,
    quantity: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord) -> Result<Self, ValidationError> {
        let normalized: Vec<String> =
            headers.iter().map(|header| header.trim().to_lowercase()).collect();

        let mut found = [None; 4];
        let mut missing = Vec::new();
        for (slot, (canonical, aliases)) in found.iter_mut().zip(COLUMNS) {
            *slot = normalized.iter().position(|header| aliases.contains(&header.as_str()));
            if slot.is_none() {
                missing.push(canonical.to_string());
            }
        }

        match found {
            [Some(store), Some(product), Some(date), Some(quantity)] => {
                Ok(Self { store, product, date, quantity })
            }
            _ => Err(ValidationError::MissingColumns { columns: missing }),
        }
    }
}

/// Reads sales rows from CSV. Errors name the 1-based line in the file,
/// counting the header as line 1.
pub fn load_sales<R: Read>(reader: R) -> Result<Vec<SalesRecord>, ValidationError> {
    let mut csv_reader =
        ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);

    let headers = csv_reader.headers().map_err(unreadable)?.clone();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut records = Vec::new();
    for (index, row) in csv_reader.records().enumerate() {
        let line = index + 2;
        let row = row.map_err(unreadable)?;
        let record = parse_row(line, &row, columns)?;
        validate_record(line, &record)?;
        records.push(record);
    }

    debug!(event_name = "cli.loader.completed", rows = records.len(), "sales table loaded");
    Ok(records)
}

pub fn load_sales_file(path: &Path) -> Result<Vec<SalesRecord>, ValidationError> {
    let file = File::open(path).map_err(|error| ValidationError::Unreadable {
        message: format!("failed to open `{}`: {error}", path.display()),
    })?;
    load_sales(file)
}

fn parse_row(
    line: usize,
    row: &StringRecord,
    columns: ColumnIndex,
) -> Result<SalesRecord, ValidationError> {
    let store = required(line, row, columns.store, "store_id")?;
    let product = required(line, row, columns.product, "product_id")?;
    let date_raw = required(line, row, columns.date, "date")?;
    let quantity_raw = required(line, row, columns.quantity, "quantity_sold")?;

    let date = parse_date(date_raw)
        .ok_or_else(|| ValidationError::InvalidDate { row: line, value: date_raw.to_string() })?;
    let quantity = quantity_raw.parse::<f64>().map_err(|_| ValidationError::InvalidQuantity {
        row: line,
        value: quantity_raw.to_string(),
    })?;

    Ok(SalesRecord::new(store, product, date, quantity))
}

fn required<'r>(
    line: usize,
    row: &'r StringRecord,
    index: usize,
    field: &'static str,
) -> Result<&'r str, ValidationError> {
    match row.get(index) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ValidationError::BlankField { row: line, field }),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn unreadable(error: csv::Error) -> ValidationError {
    let message = match error.position() {
        Some(position) => format!("line {}: {error}", position.line()),
        None => error.to_string(),
    };
    ValidationError::Unreadable { message }
}
