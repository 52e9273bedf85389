use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{features::FeatureVector, product::ProductId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    Spiky,
    InsufficientData,
}

impl Trend {
    pub const ALL: [Trend; 5] = [
        Trend::Increasing,
        Trend::Decreasing,
        Trend::Stable,
        Trend::Spiky,
        Trend::InsufficientData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
            Self::Spiky => "spiky",
            Self::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classification rule produced the label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedRule {
    MinimumHistory,
    HighVolatility,
    ExtremeJump,
    UpwardMomentum,
    DownwardMomentum,
    StableBand,
}

/// The classifier's verdict for one product, with the evidence behind it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendLabel {
    pub trend: Trend,
    pub rule: MatchedRule,
    pub evidence: FeatureVector,
    /// Set when the upward and downward rules both matched. Only a
    /// misconfigured threshold set can produce this.
    pub contradiction: bool,
}

impl TrendLabel {
    pub fn product_id(&self) -> &ProductId {
        &self.evidence.product_id
    }
}
