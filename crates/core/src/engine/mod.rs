pub mod aggregation;
pub mod classifier;
pub mod features;
pub mod recommendation;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::config::RuleConfig;
use crate::domain::{
    product::ProductId,
    recommendation::{Recommendation, StockAction},
    sales::{AggregationSummary, ProductDailySeries, SalesRecord},
};
use crate::errors::{ComputationError, PipelineError, PipelineStage};

use self::{
    aggregation::{DeterministicAggregator, SalesAggregator},
    classifier::{RuleBasedClassifier, TrendClassifier},
    features::{FeatureExtractor, WindowFeatureExtractor},
    recommendation::{RecommendationMapper, StaticRecommendationMapper},
};

#[derive(Clone, Copy, Debug)]
pub struct PipelineInput<'a> {
    pub records: &'a [SalesRecord],
    pub rules: &'a RuleConfig,
}

/// A product that could not be evaluated, with the stage that failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFailure {
    pub product_id: ProductId,
    pub stage: PipelineStage,
    pub message: String,
}

impl From<&ComputationError> for ProductFailure {
    fn from(error: &ComputationError) -> Self {
        Self {
            product_id: error.product_id().clone(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProductOutcome {
    Recommended(Recommendation),
    Excluded(ProductFailure),
}

impl ProductOutcome {
    pub fn product_id(&self) -> &ProductId {
        match self {
            Self::Recommended(recommendation) => &recommendation.product_id,
            Self::Excluded(failure) => &failure.product_id,
        }
    }
}

/// Result of one run: one entry per distinct product, ascending by product id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub summary: AggregationSummary,
    pub entries: Vec<ProductOutcome>,
}

impl PipelineReport {
    pub fn recommendations(&self) -> impl Iterator<Item = &Recommendation> {
        self.entries.iter().filter_map(|entry| match entry {
            ProductOutcome::Recommended(recommendation) => Some(recommendation),
            ProductOutcome::Excluded(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProductFailure> {
        self.entries.iter().filter_map(|entry| match entry {
            ProductOutcome::Excluded(failure) => Some(failure),
            ProductOutcome::Recommended(_) => None,
        })
    }

    pub fn count_action(&self, action: StockAction) -> usize {
        self.recommendations().filter(|recommendation| recommendation.action == action).count()
    }
}

pub trait PipelineRuntime: Send + Sync {
    fn run(&self, input: PipelineInput<'_>) -> Result<PipelineReport, PipelineError>;
}

pub struct DemandPipeline<A, F, C, M> {
    aggregator: A,
    extractor: F,
    classifier: C,
    mapper: M,
    audit_sink: Option<Arc<dyn AuditSink>>,
}

pub type DefaultPipeline = DemandPipeline<
    DeterministicAggregator,
    WindowFeatureExtractor,
    RuleBasedClassifier,
    StaticRecommendationMapper,
>;

impl<A, F, C, M> DemandPipeline<A, F, C, M> {
    pub fn new(aggregator: A, extractor: F, classifier: C, mapper: M) -> Self {
        Self { aggregator, extractor, classifier, mapper, audit_sink: None }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    fn audit(&self, event: impl FnOnce() -> AuditEvent) {
        if let Some(sink) = &self.audit_sink {
            sink.emit(event());
        }
    }
}

impl Default for DefaultPipeline {
    fn default() -> Self {
        Self::new(
            DeterministicAggregator,
            WindowFeatureExtractor,
            RuleBasedClassifier,
            StaticRecommendationMapper,
        )
    }
}

impl<A, F, C, M> DemandPipeline<A, F, C, M>
where
    A: SalesAggregator,
    F: FeatureExtractor,
    C: TrendClassifier,
    M: RecommendationMapper,
{
    fn evaluate_product(
        &self,
        run_id: &str,
        series: &ProductDailySeries,
        rules: &RuleConfig,
    ) -> ProductOutcome {
        let features = match self.extractor.extract(series, rules) {
            Ok(features) => features,
            Err(failure) => {
                error!(
                    event_name = "engine.product.excluded",
                    run_id,
                    product_id = %failure.product_id(),
                    stage = %failure.stage(),
                    error = %failure,
                    "product excluded from run"
                );
                self.audit(|| {
                    AuditEvent::new(
                        run_id,
                        Some(failure.product_id().clone()),
                        "product.excluded",
                        AuditCategory::Features,
                        AuditOutcome::Excluded,
                    )
                    .with_metadata("stage", failure.stage().as_str())
                    .with_metadata("error", failure.to_string())
                });
                return ProductOutcome::Excluded(ProductFailure::from(&failure));
            }
        };

        let label = self.classifier.classify(features, rules);
        if label.contradiction {
            self.audit(|| {
                AuditEvent::new(
                    run_id,
                    Some(label.product_id().clone()),
                    "classification.contradiction",
                    AuditCategory::Classification,
                    AuditOutcome::Flagged,
                )
                .with_metadata("percent_change", label.evidence.percent_change.to_string())
                .with_metadata("increase_threshold", rules.increase_threshold.to_string())
                .with_metadata("decrease_threshold", rules.decrease_threshold.to_string())
            });
        }

        let recommendation = self.mapper.recommend(&label, rules);
        debug!(
            event_name = "engine.product.classified",
            run_id,
            product_id = %recommendation.product_id,
            trend = %recommendation.trend,
            action = %recommendation.action,
            strength = %recommendation.strength,
            data_points = label.evidence.data_point_count,
            "product classified"
        );
        self.audit(|| {
            AuditEvent::new(
                run_id,
                Some(recommendation.product_id.clone()),
                "product.classified",
                AuditCategory::Recommendation,
                AuditOutcome::Success,
            )
            .with_metadata("trend", recommendation.trend.as_str())
            .with_metadata("action", recommendation.action.as_str())
            .with_metadata("strength", recommendation.strength.as_str())
        });

        ProductOutcome::Recommended(recommendation)
    }
}

impl<A, F, C, M> PipelineRuntime for DemandPipeline<A, F, C, M>
where
    A: SalesAggregator,
    F: FeatureExtractor,
    C: TrendClassifier,
    M: RecommendationMapper,
{
    fn run(&self, input: PipelineInput<'_>) -> Result<PipelineReport, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let rules = input.rules;

        if let Err(rejection) = rules.validate() {
            warn!(
                event_name = "engine.run.rejected",
                run_id = %run_id,
                error = %rejection,
                "rule configuration rejected"
            );
            return Err(PipelineError::Configuration(rejection.to_string()));
        }

        info!(
            event_name = "engine.run.started",
            run_id = %run_id,
            records = input.records.len(),
            window_size = rules.window_size,
            "demand signal run started"
        );
        self.audit(|| {
            AuditEvent::new(&run_id, None, "run.started", AuditCategory::Run, AuditOutcome::Success)
                .with_metadata("records", input.records.len().to_string())
        });

        let aggregation = match self.aggregator.aggregate(input.records, rules) {
            Ok(aggregation) => aggregation,
            Err(rejection) => {
                warn!(
                    event_name = "engine.run.invalid_input",
                    run_id = %run_id,
                    stage = %PipelineStage::Aggregation,
                    error = %rejection,
                    "input rejected during aggregation"
                );
                self.audit(|| {
                    AuditEvent::new(
                        &run_id,
                        None,
                        "run.invalid_input",
                        AuditCategory::Aggregation,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", rejection.to_string())
                });
                return Err(PipelineError::Validation(rejection));
            }
        };

        let entries: Vec<ProductOutcome> = aggregation
            .series
            .values()
            .map(|series| self.evaluate_product(&run_id, series, rules))
            .collect();

        let report = PipelineReport { summary: aggregation.summary, entries };
        let excluded = report.failures().count();
        info!(
            event_name = "engine.run.completed",
            run_id = %run_id,
            products = report.entries.len(),
            excluded,
            "demand signal run completed"
        );
        self.audit(|| {
            AuditEvent::new(
                &run_id,
                None,
                "run.completed",
                AuditCategory::Run,
                AuditOutcome::Success,
            )
            .with_metadata("products", report.entries.len().to_string())
            .with_metadata("excluded", excluded.to_string())
        });

        Ok(report)
    }
}

/// Runs the default pipeline without an audit sink.
pub fn run_pipeline(
    records: &[SalesRecord],
    rules: &RuleConfig,
) -> Result<PipelineReport, PipelineError> {
    DefaultPipeline::default().run(PipelineInput { records, rules })
}
