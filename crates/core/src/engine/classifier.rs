use tracing::warn;

use crate::config::RuleConfig;
use crate::domain::{
    features::FeatureVector,
    trend::{MatchedRule, Trend, TrendLabel},
};

pub trait TrendClassifier: Send + Sync {
    fn classify(&self, features: FeatureVector, rules: &RuleConfig) -> TrendLabel;
}

#[derive(Default)]
pub struct RuleBasedClassifier;

impl TrendClassifier for RuleBasedClassifier {
    fn classify(&self, features: FeatureVector, rules: &RuleConfig) -> TrendLabel {
        classify_features(features, rules)
    }
}

/// Applies the ordered rules; the first match wins:
/// minimum history, spiky (volatility or extreme jump), upward, downward,
/// then stable as the fallback.
pub fn classify_features(features: FeatureVector, rules: &RuleConfig) -> TrendLabel {
    let (trend, rule, contradiction) = evaluate_rules(&features, rules);
    TrendLabel { trend, rule, evidence: features, contradiction }
}

fn evaluate_rules(features: &FeatureVector, rules: &RuleConfig) -> (Trend, MatchedRule, bool) {
    if features.data_point_count < rules.min_data_points {
        return (Trend::InsufficientData, MatchedRule::MinimumHistory, false);
    }

    if features.volatility_index > rules.spiky_volatility_threshold {
        return (Trend::Spiky, MatchedRule::HighVolatility, false);
    }
    if features.percent_change.abs() > rules.spiky_jump_threshold {
        return (Trend::Spiky, MatchedRule::ExtremeJump, false);
    }

    let upward = features.percent_change >= rules.increase_threshold
        && features.last_value > features.recent_average;
    let downward = features.percent_change <= rules.decrease_threshold
        && features.last_value < features.recent_average;

    let (trend, rule, contradiction) = resolve_direction(upward, downward);
    if contradiction {
        warn!(
            event_name = "engine.classification.contradiction",
            product_id = %features.product_id,
            percent_change = features.percent_change,
            increase_threshold = rules.increase_threshold,
            decrease_threshold = rules.decrease_threshold,
            "upward and downward rules both matched; threshold set is misconfigured"
        );
    }
    (trend, rule, contradiction)
}

/// Upward takes priority when both directional rules hold; the tie is
/// reported back so callers can audit it.
fn resolve_direction(upward: bool, downward: bool) -> (Trend, MatchedRule, bool) {
    match (upward, downward) {
        (true, true) => (Trend::Increasing, MatchedRule::UpwardMomentum, true),
        (true, false) => (Trend::Increasing, MatchedRule::UpwardMomentum, false),
        (false, true) => (Trend::Decreasing, MatchedRule::DownwardMomentum, false),
        (false, false) => (Trend::Stable, MatchedRule::StableBand, false),
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_features, resolve_direction, RuleBasedClassifier, TrendClassifier};
    use crate::{
        config::RuleConfig,
        domain::{
            features::FeatureVector,
            product::ProductId,
            trend::{MatchedRule, Trend},
        },
    };

    fn vector(count: usize, average: f64, last: f64, volatility: f64) -> FeatureVector {
        let percent_change = if average == 0.0 { 0.0 } else { (last - average) / average };
        FeatureVector {
            product_id: ProductId::new("salbutamol-inhaler"),
            window_size_used: count,
            recent_average: average,
            last_value: last,
            percent_change,
            volatility_index: volatility,
            data_point_count: count,
            window_start: None,
            window_end: None,
            rising_days: 0,
            falling_days: 0,
            largest_daily_jump: 0.0,
        }
    }

    #[test]
    fn fewer_than_minimum_points_is_always_insufficient() {
        let rules = RuleConfig::default();
        for count in 0..3 {
            for (average, last, volatility) in
                [(100.0, 400.0, 2.0), (100.0, 10.0, 0.0), (0.0, 0.0, 0.0), (50.0, 50.0, 0.9)]
            {
                let label = classify_features(vector(count, average, last, volatility), &rules);
                assert_eq!(label.trend, Trend::InsufficientData, "count {count}");
                assert_eq!(label.rule, MatchedRule::MinimumHistory);
            }
        }
    }

    #[test]
    fn high_volatility_wins_over_upward_rule() {
        let label =
            classify_features(vector(7, 100.0, 140.0, 0.6), &RuleConfig::default());
        assert_eq!(label.trend, Trend::Spiky);
        assert_eq!(label.rule, MatchedRule::HighVolatility);
    }

    #[test]
    fn extreme_jump_is_spiky_even_with_low_volatility() {
        let label =
            classify_features(vector(7, 121.429, 250.0, 0.43), &RuleConfig::default());
        assert_eq!(label.trend, Trend::Spiky);
        assert_eq!(label.rule, MatchedRule::ExtremeJump);

        let drop = classify_features(vector(7, 100.0, 10.0, 0.30), &RuleConfig::default());
        assert_eq!(drop.trend, Trend::Spiky);
    }

    #[test]
    fn directional_rules_need_threshold_and_momentum() {
        let rules = RuleConfig::default();

        let up = classify_features(vector(7, 105.714, 140.0, 0.13), &rules);
        assert_eq!(up.trend, Trend::Increasing);
        assert!(!up.contradiction);

        let down = classify_features(vector(7, 100.0, 70.0, 0.15), &rules);
        assert_eq!(down.trend, Trend::Decreasing);
        assert_eq!(down.rule, MatchedRule::DownwardMomentum);

        let threshold_edge = classify_features(vector(5, 100.0, 120.0, 0.10), &rules);
        assert_eq!(threshold_edge.trend, Trend::Increasing);
    }

    #[test]
    fn small_moves_fall_back_to_stable() {
        let rules = RuleConfig::default();
        let label = RuleBasedClassifier.classify(vector(5, 50.4, 50.0, 0.02), &rules);
        assert_eq!(label.trend, Trend::Stable);
        assert_eq!(label.rule, MatchedRule::StableBand);

        let flat_zero = RuleBasedClassifier.classify(vector(4, 0.0, 0.0, 0.0), &rules);
        assert_eq!(flat_zero.trend, Trend::Stable);
    }

    #[test]
    fn thresholds_are_taken_from_configuration() {
        let strict = RuleConfig::default().with_stable_band(0.50);
        let label = classify_features(vector(7, 105.714, 140.0, 0.13), &strict);
        assert_eq!(label.trend, Trend::Stable);

        let lenient_spikes = RuleConfig { spiky_jump_threshold: 2.0, ..RuleConfig::default() };
        let label = classify_features(vector(7, 121.429, 250.0, 0.43), &lenient_spikes);
        assert_eq!(label.trend, Trend::Increasing);
    }

    #[test]
    fn label_carries_its_evidence() {
        let features = vector(6, 80.0, 60.0, 0.2);
        let label = classify_features(features.clone(), &RuleConfig::default());
        assert_eq!(label.evidence, features);
        assert_eq!(label.product_id().as_str(), "salbutamol-inhaler");
    }

    #[test]
    fn directional_tie_prefers_increasing_and_is_flagged() {
        let (trend, rule, contradiction) = resolve_direction(true, true);
        assert_eq!(trend, Trend::Increasing);
        assert_eq!(rule, MatchedRule::UpwardMomentum);
        assert!(contradiction);

        assert!(!resolve_direction(false, true).2);
    }

    #[test]
    fn every_vector_maps_to_exactly_one_known_label() {
        let rules = RuleConfig::default();
        for count in [0, 1, 2, 3, 7] {
            for average in [0.0, 1.0, 100.0] {
                for last in [0.0, 1.0, 50.0, 100.0, 175.0, 400.0] {
                    for volatility in [0.0, 0.3, 0.5, 0.51, 3.0] {
                        let label =
                            classify_features(vector(count, average, last, volatility), &rules);
                        assert!(Trend::ALL.contains(&label.trend));
                    }
                }
            }
        }
    }
}
