use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{features::FeatureVector, product::ProductId, trend::Trend};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    IncreaseStock,
    ReduceStock,
    MaintainStock,
    ReviewData,
}

impl StockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncreaseStock => "increase_stock",
            Self::ReduceStock => "reduce_stock",
            Self::MaintainStock => "maintain_stock",
            Self::ReviewData => "review_data",
        }
    }
}

impl fmt::Display for StockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthTier {
    Low,
    Medium,
    High,
}

impl StrengthTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for StrengthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub trend: Trend,
    pub action: StockAction,
    pub strength: StrengthTier,
    pub rationale: String,
    pub evidence: FeatureVector,
}
