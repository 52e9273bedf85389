pub mod audit;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, RuleConfig};
pub use domain::features::FeatureVector;
pub use domain::product::{ProductId, StoreId};
pub use domain::recommendation::{Recommendation, StockAction, StrengthTier};
pub use domain::sales::{AggregationSummary, ProductDailySeries, SalesRecord, SeriesPoint};
pub use domain::trend::{MatchedRule, Trend, TrendLabel};
pub use engine::{
    run_pipeline, DefaultPipeline, DemandPipeline, PipelineInput, PipelineReport,
    PipelineRuntime, ProductFailure, ProductOutcome,
};
pub use errors::{ComputationError, PipelineError, PipelineStage, ValidationError};
