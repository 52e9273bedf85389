use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RuleConfig;
use crate::domain::{
    product::{ProductId, StoreId},
    sales::{AggregationSummary, ProductDailySeries, SalesRecord, SeriesPoint},
};
use crate::errors::ValidationError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Keyed by product id, so iteration is in ascending product order.
    pub series: BTreeMap<ProductId, ProductDailySeries>,
    pub summary: AggregationSummary,
}

pub trait SalesAggregator: Send + Sync {
    fn aggregate(
        &self,
        records: &[SalesRecord],
        rules: &RuleConfig,
    ) -> Result<Aggregation, ValidationError>;
}

#[derive(Default)]
pub struct DeterministicAggregator;

impl SalesAggregator for DeterministicAggregator {
    fn aggregate(
        &self,
        records: &[SalesRecord],
        rules: &RuleConfig,
    ) -> Result<Aggregation, ValidationError> {
        aggregate_sales(records, rules.fill_missing_dates)
    }
}

#[derive(Default)]
struct DayTotal<'a> {
    quantity: f64,
    stores: BTreeSet<&'a StoreId>,
}

/// Rejects a record the engine must not silently coerce. `row` is 1-based.
pub fn validate_record(row: usize, record: &SalesRecord) -> Result<(), ValidationError> {
    if record.store_id.as_str().trim().is_empty() {
        return Err(ValidationError::BlankField { row, field: "store_id" });
    }
    if record.product_id.as_str().trim().is_empty() {
        return Err(ValidationError::BlankField { row, field: "product_id" });
    }
    if !record.quantity_sold.is_finite() {
        return Err(ValidationError::NonFiniteQuantity {
            row,
            product_id: record.product_id.clone(),
        });
    }
    if record.quantity_sold < 0.0 {
        return Err(ValidationError::NegativeQuantity {
            row,
            product_id: record.product_id.clone(),
            value: record.quantity_sold,
        });
    }
    Ok(())
}

/// Sums store-level sales into one ascending daily series per product.
pub fn aggregate_sales(
    records: &[SalesRecord],
    fill_missing_dates: bool,
) -> Result<Aggregation, ValidationError> {
    let mut totals: BTreeMap<&ProductId, BTreeMap<NaiveDate, DayTotal<'_>>> = BTreeMap::new();
    let mut stores: BTreeSet<&StoreId> = BTreeSet::new();
    let mut days: BTreeSet<NaiveDate> = BTreeSet::new();

    for (index, record) in records.iter().enumerate() {
        validate_record(index + 1, record)?;

        let day = totals.entry(&record.product_id).or_default().entry(record.date).or_default();
        day.quantity += record.quantity_sold;
        day.stores.insert(&record.store_id);

        stores.insert(&record.store_id);
        days.insert(record.date);
    }

    let series: BTreeMap<ProductId, ProductDailySeries> = totals
        .into_iter()
        .map(|(product_id, by_day)| {
            let mut points: Vec<SeriesPoint> = by_day
                .into_iter()
                .map(|(date, total)| SeriesPoint {
                    date,
                    total_quantity: total.quantity,
                    contributing_stores: total.stores.len(),
                })
                .collect();
            if fill_missing_dates {
                points = fill_gaps(points);
            }
            (product_id.clone(), ProductDailySeries { product_id: product_id.clone(), points })
        })
        .collect();

    let summary = AggregationSummary {
        store_count: stores.len(),
        product_count: series.len(),
        day_count: days.len(),
        rows_in: records.len(),
        rows_out: series.values().map(ProductDailySeries::len).sum(),
    };

    debug!(
        event_name = "engine.aggregation.completed",
        rows_in = summary.rows_in,
        rows_out = summary.rows_out,
        products = summary.product_count,
        stores = summary.store_count,
        fill_missing_dates,
        "store sales aggregated into product daily series"
    );

    Ok(Aggregation { series, summary })
}

fn fill_gaps(points: Vec<SeriesPoint>) -> Vec<SeriesPoint> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return points;
    };
    let (first_date, last_date) = (first.date, last.date);

    let mut observed = points.into_iter().peekable();
    first_date
        .iter_days()
        .take_while(|date| *date <= last_date)
        .map(|date| match observed.next_if(|point| point.date == date) {
            Some(point) => point,
            None => SeriesPoint { date, total_quantity: 0.0, contributing_stores: 0 },
        })
        .collect()
}
