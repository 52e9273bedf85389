use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::product::ProductId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Aggregation,
    FeatureExtraction,
    Classification,
    Recommendation,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregation => "aggregation",
            Self::FeatureExtraction => "feature_extraction",
            Self::Classification => "classification",
            Self::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural problems in the input table. Always fatal for the run.
///
/// `row` is the 1-based position of the offending record in its source.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("input is missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },
    #[error("row {row}: required field `{field}` is blank")]
    BlankField { row: usize, field: &'static str },
    #[error("row {row}: could not parse date `{value}` (expected YYYY-MM-DD)")]
    InvalidDate { row: usize, value: String },
    #[error("row {row}: could not parse quantity_sold `{value}`")]
    InvalidQuantity { row: usize, value: String },
    #[error("row {row}: quantity_sold for product `{product_id}` must be >= 0, got {value}")]
    NegativeQuantity { row: usize, product_id: ProductId, value: f64 },
    #[error("row {row}: quantity_sold for product `{product_id}` is not a finite number")]
    NonFiniteQuantity { row: usize, product_id: ProductId },
    #[error("could not read sales table: {message}")]
    Unreadable { message: String },
}

/// Per-product numeric failures. The product is excluded from the run and an
/// audit note is recorded; other products are unaffected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ComputationError {
    #[error(
        "series for product `{product_id}` is not strictly ascending by date at position {position}"
    )]
    MalformedSeries { product_id: ProductId, position: usize },
    #[error("product `{product_id}` produced a non-finite {feature} during {stage}")]
    NonFiniteFeature { product_id: ProductId, stage: PipelineStage, feature: &'static str },
}

impl ComputationError {
    pub fn product_id(&self) -> &ProductId {
        match self {
            Self::MalformedSeries { product_id, .. }
            | Self::NonFiniteFeature { product_id, .. } => product_id,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::MalformedSeries { .. } => PipelineStage::FeatureExtraction,
            Self::NonFiniteFeature { stage, .. } => *stage,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("rule configuration rejected: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Stable machine-readable class used in operator-facing envelopes.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "input_validation",
            Self::Configuration(_) => "config_validation",
        }
    }
}
