use crate::config::RuleConfig;
use crate::domain::{features::FeatureVector, product::ProductId, sales::ProductDailySeries};
use crate::errors::{ComputationError, PipelineStage};

/// Number of trailing day-over-day moves inspected for direction evidence.
const DIRECTION_LOOKBACK: usize = 3;

pub trait FeatureExtractor: Send + Sync {
    fn extract(
        &self,
        series: &ProductDailySeries,
        rules: &RuleConfig,
    ) -> Result<FeatureVector, ComputationError>;
}

#[derive(Default)]
pub struct WindowFeatureExtractor;

impl FeatureExtractor for WindowFeatureExtractor {
    fn extract(
        &self,
        series: &ProductDailySeries,
        rules: &RuleConfig,
    ) -> Result<FeatureVector, ComputationError> {
        extract_features(series, rules.window_size)
    }
}

/// Computes the feature vector over the last `min(window_size, len)` points.
///
/// Short series still extract; deciding that history is insufficient belongs
/// to the classifier.
pub fn extract_features(
    series: &ProductDailySeries,
    window_size: usize,
) -> Result<FeatureVector, ComputationError> {
    if let Some(position) = first_out_of_order(series) {
        return Err(ComputationError::MalformedSeries {
            product_id: series.product_id.clone(),
            position,
        });
    }

    let start = series.len().saturating_sub(window_size);
    let window = &series.points[start..];
    let values: Vec<f64> = window.iter().map(|point| point.total_quantity).collect();

    let recent_average = mean(&values);
    let last_value = values.last().copied().unwrap_or(0.0);
    let percent_change = ratio_or_zero(last_value - recent_average, recent_average);
    let volatility_index =
        ratio_or_zero(population_std_dev(&values, recent_average), recent_average);
    let (rising_days, falling_days) = recent_direction(&values);
    let largest_daily_jump = largest_daily_jump(&values);

    let product_id = &series.product_id;
    ensure_finite(product_id, "recent_average", recent_average)?;
    ensure_finite(product_id, "last_value", last_value)?;
    ensure_finite(product_id, "percent_change", percent_change)?;
    ensure_finite(product_id, "volatility_index", volatility_index)?;
    ensure_finite(product_id, "largest_daily_jump", largest_daily_jump)?;

    Ok(FeatureVector {
        product_id: product_id.clone(),
        window_size_used: values.len(),
        recent_average,
        last_value,
        percent_change,
        volatility_index,
        data_point_count: values.len(),
        window_start: window.first().map(|point| point.date),
        window_end: window.last().map(|point| point.date),
        rising_days,
        falling_days,
        largest_daily_jump,
    })
}

fn first_out_of_order(series: &ProductDailySeries) -> Option<usize> {
    series.points.windows(2).position(|pair| pair[0].date >= pair[1].date).map(|index| index + 1)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Division with the zero-average guard: a zero denominator yields 0.
fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() <= f64::EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

fn recent_direction(values: &[f64]) -> (usize, usize) {
    let moves: Vec<f64> = values.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let recent = &moves[moves.len().saturating_sub(DIRECTION_LOOKBACK)..];
    let rising = recent.iter().filter(|delta| **delta > 0.0).count();
    let falling = recent.iter().filter(|delta| **delta < 0.0).count();
    (rising, falling)
}

fn largest_daily_jump(values: &[f64]) -> f64 {
    values
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| ((pair[1] - pair[0]) / pair[0]).abs())
        .fold(0.0, f64::max)
}

fn ensure_finite(
    product_id: &ProductId,
    feature: &'static str,
    value: f64,
) -> Result<(), ComputationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ComputationError::NonFiniteFeature {
            product_id: product_id.clone(),
            stage: PipelineStage::FeatureExtraction,
            feature,
        })
    }
}
