use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

/// Statistical evidence computed from a product's active window.
///
/// `window_size_used` and `data_point_count` both describe the active window:
/// the former is bounded by the configured window, the latter is the number of
/// totals that actually fed the statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub product_id: ProductId,
    pub window_size_used: usize,
    pub recent_average: f64,
    pub last_value: f64,
    pub percent_change: f64,
    pub volatility_index: f64,
    pub data_point_count: usize,
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
    /// Positive day-over-day moves among the last three moves of the window.
    pub rising_days: usize,
    /// Negative day-over-day moves among the last three moves of the window.
    pub falling_days: usize,
    /// Largest absolute relative day-over-day change; days following a zero
    /// total are skipped.
    pub largest_daily_jump: f64,
}

impl FeatureVector {
    pub fn percent_change_pct(&self) -> f64 {
        self.percent_change * 100.0
    }

    pub fn is_empty(&self) -> bool {
        self.data_point_count == 0
    }
}
