use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::product::{ProductId, StoreId};

/// One row of the validated sales table: units of one product sold by one
/// store on one calendar day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub date: NaiveDate,
    pub quantity_sold: f64,
}

impl SalesRecord {
    pub fn new(
        store_id: impl Into<String>,
        product_id: impl Into<String>,
        date: NaiveDate,
        quantity_sold: f64,
    ) -> Self {
        Self {
            store_id: StoreId::new(store_id),
            product_id: ProductId::new(product_id),
            date,
            quantity_sold,
        }
    }
}

/// Total demand for one product on one day, summed across stores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub total_quantity: f64,
    pub contributing_stores: usize,
}

/// Per-product daily totals ordered ascending by date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductDailySeries {
    pub product_id: ProductId,
    pub points: Vec<SeriesPoint>,
}

impl ProductDailySeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn quantities(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|point| point.total_quantity)
    }

    /// True when every date is strictly later than the one before it.
    pub fn is_strictly_ascending(&self) -> bool {
        self.points.windows(2).all(|pair| pair[0].date < pair[1].date)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSummary {
    pub store_count: usize,
    pub product_count: usize,
    pub day_count: usize,
    pub rows_in: usize,
    pub rows_out: usize,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ProductDailySeries, SeriesPoint};
    use crate::domain::product::ProductId;

    fn point(day: u32, total_quantity: f64) -> SeriesPoint {
        SeriesPoint {
            date: NaiveDate::from_ymd_opt(2025, 3, day).expect("valid test date"),
            total_quantity,
            contributing_stores: 1,
        }
    }

    #[test]
    fn ascending_check_rejects_duplicates_and_reversals() {
        let ordered = ProductDailySeries {
            product_id: ProductId::new("amoxicillin-500"),
            points: vec![point(1, 3.0), point(2, 4.0), point(5, 1.0)],
        };
        assert!(ordered.is_strictly_ascending());

        let duplicated = ProductDailySeries {
            product_id: ProductId::new("amoxicillin-500"),
            points: vec![point(1, 3.0), point(1, 4.0)],
        };
        assert!(!duplicated.is_strictly_ascending());

        let reversed = ProductDailySeries {
            product_id: ProductId::new("amoxicillin-500"),
            points: vec![point(4, 3.0), point(2, 4.0)],
        };
        assert!(!reversed.is_strictly_ascending());
    }
}
