use crate::config::{RuleConfig, StrengthTiers};
use crate::domain::{
    features::FeatureVector,
    recommendation::{Recommendation, StockAction, StrengthTier},
    trend::{MatchedRule, Trend, TrendLabel},
};

pub trait RecommendationMapper: Send + Sync {
    fn recommend(&self, label: &TrendLabel, rules: &RuleConfig) -> Recommendation;
}

#[derive(Default)]
pub struct StaticRecommendationMapper;

impl RecommendationMapper for StaticRecommendationMapper {
    fn recommend(&self, label: &TrendLabel, rules: &RuleConfig) -> Recommendation {
        map_recommendation(label, rules)
    }
}

pub fn map_recommendation(label: &TrendLabel, rules: &RuleConfig) -> Recommendation {
    let features = &label.evidence;
    let (action, strength) = match label.trend {
        Trend::Increasing => (
            StockAction::IncreaseStock,
            tier_for_excess(features.percent_change - rules.increase_threshold, &rules.strength),
        ),
        Trend::Decreasing => (
            StockAction::ReduceStock,
            tier_for_excess(rules.decrease_threshold - features.percent_change, &rules.strength),
        ),
        Trend::Stable => (StockAction::MaintainStock, StrengthTier::Low),
        Trend::Spiky => (StockAction::ReviewData, spiky_tier(features, rules)),
        Trend::InsufficientData => (StockAction::ReviewData, StrengthTier::Low),
    };

    Recommendation {
        product_id: features.product_id.clone(),
        trend: label.trend,
        action,
        strength,
        rationale: build_rationale(label, strength, rules),
        evidence: features.clone(),
    }
}

/// Slack for tier cut-offs so that a change landing exactly on a boundary
/// (e.g. +30% against a +20% threshold) is not lost to rounding.
const TIER_TOLERANCE: f64 = 1e-9;

fn reaches(value: f64, cutoff: f64) -> bool {
    value + TIER_TOLERANCE >= cutoff
}

fn tier_for_excess(excess: f64, tiers: &StrengthTiers) -> StrengthTier {
    if reaches(excess, tiers.high_excess) {
        StrengthTier::High
    } else if reaches(excess, tiers.medium_excess) {
        StrengthTier::Medium
    } else {
        StrengthTier::Low
    }
}

fn spiky_tier(features: &FeatureVector, rules: &RuleConfig) -> StrengthTier {
    let erratic = reaches(features.volatility_index, rules.strength.high_volatility);
    let extreme = reaches(features.percent_change.abs(), 2.0 * rules.spiky_jump_threshold);
    if erratic || extreme {
        StrengthTier::High
    } else {
        StrengthTier::Medium
    }
}

fn build_rationale(label: &TrendLabel, strength: StrengthTier, rules: &RuleConfig) -> String {
    let f = &label.evidence;
    let days = f.data_point_count;
    let moves = days.saturating_sub(1).min(3);

    match label.trend {
        Trend::InsufficientData => format!(
            "Insufficient history: only {days} day(s) of sales available, {} required. \
             Review sales history or ensure data capture is complete.",
            rules.min_data_points
        ),
        Trend::Increasing => {
            let advice = match strength {
                StrengthTier::High => "Increase stock levels aggressively to avoid stock-outs.",
                StrengthTier::Medium => "Increase stock levels gradually and continue monitoring.",
                StrengthTier::Low => "Consider a mild stock increase and monitor closely.",
            };
            format!(
                "Last day sales ({:.1}) are {:+.1}% versus the {days}-day average ({:.1}); \
                 {} of the last {moves} day-over-day moves were increases. {advice}",
                f.last_value,
                f.percent_change_pct(),
                f.recent_average,
                f.rising_days
            )
        }
        Trend::Decreasing => {
            let advice = match strength {
                StrengthTier::High => "Reduce stock levels significantly to avoid overstocking.",
                StrengthTier::Medium => "Reduce stock gradually and monitor.",
                StrengthTier::Low => "Consider small reductions in stock or slower replenishment.",
            };
            format!(
                "Last day sales ({:.1}) are {:+.1}% versus the {days}-day average ({:.1}); \
                 {} of the last {moves} day-over-day moves were decreases. {advice}",
                f.last_value,
                f.percent_change_pct(),
                f.recent_average,
                f.falling_days
            )
        }
        Trend::Stable => format!(
            "Last day sales ({:.1}) are {:+.1}% versus the {days}-day average ({:.1}), inside the \
             {:+.0}%/{:+.0}% band (volatility index {:.2}). Maintain current stock levels with \
             normal replenishment cycles.",
            f.last_value,
            f.percent_change_pct(),
            f.recent_average,
            rules.decrease_threshold * 100.0,
            rules.increase_threshold * 100.0,
            f.volatility_index
        ),
        Trend::Spiky => {
            let cause = if label.rule == MatchedRule::HighVolatility {
                format!(
                    "Demand is volatile over the last {days} days (volatility index {:.2} above \
                     {:.2}); no consistent upward or downward trend.",
                    f.volatility_index, rules.spiky_volatility_threshold
                )
            } else {
                format!(
                    "Last day sales ({:.1}) moved {:+.1}% against the {days}-day average ({:.1}), \
                     beyond the {:.0}% single-day limit.",
                    f.last_value,
                    f.percent_change_pct(),
                    f.recent_average,
                    rules.spiky_jump_threshold * 100.0
                )
            };
            format!(
                "{cause} Avoid drastic stock changes; investigate promotions, one-off events or \
                 data errors."
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{map_recommendation, RecommendationMapper, StaticRecommendationMapper};
    use crate::{
        config::RuleConfig,
        domain::{
            features::FeatureVector,
            product::ProductId,
            recommendation::{StockAction, StrengthTier},
            trend::{MatchedRule, Trend, TrendLabel},
        },
    };

    fn label(trend: Trend, rule: MatchedRule, percent_change: f64, volatility: f64) -> TrendLabel {
        let recent_average = 100.0;
        TrendLabel {
            trend,
            rule,
            evidence: FeatureVector {
                product_id: ProductId::new("lisinopril-10"),
                window_size_used: 7,
                recent_average,
                last_value: recent_average * (1.0 + percent_change),
                percent_change,
                volatility_index: volatility,
                data_point_count: 7,
                window_start: None,
                window_end: None,
                rising_days: 2,
                falling_days: 1,
                largest_daily_jump: 0.1,
            },
            contradiction: false,
        }
    }

    #[test]
    fn increasing_strength_scales_with_excess_over_threshold() {
        let rules = RuleConfig::default();
        let cases =
            [(0.25, StrengthTier::Low), (0.324, StrengthTier::Medium), (0.55, StrengthTier::High)];

        for (percent_change, expected) in cases {
            let recommendation = map_recommendation(
                &label(Trend::Increasing, MatchedRule::UpwardMomentum, percent_change, 0.1),
                &rules,
            );
            assert_eq!(recommendation.action, StockAction::IncreaseStock);
            assert_eq!(recommendation.strength, expected, "percent_change {percent_change}");
        }
    }

    #[test]
    fn decreasing_strength_scales_with_excess_below_threshold() {
        let rules = RuleConfig::default();
        let cases =
            [(-0.22, StrengthTier::Low), (-0.35, StrengthTier::Medium), (-0.6, StrengthTier::High)];

        for (percent_change, expected) in cases {
            let recommendation = map_recommendation(
                &label(Trend::Decreasing, MatchedRule::DownwardMomentum, percent_change, 0.1),
                &rules,
            );
            assert_eq!(recommendation.action, StockAction::ReduceStock);
            assert_eq!(recommendation.strength, expected, "percent_change {percent_change}");
        }
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        let rules = RuleConfig::default();
        let cases = [
            (Trend::Increasing, MatchedRule::UpwardMomentum, 0.3, StrengthTier::Medium),
            (Trend::Increasing, MatchedRule::UpwardMomentum, 0.5, StrengthTier::High),
            (Trend::Decreasing, MatchedRule::DownwardMomentum, -0.3, StrengthTier::Medium),
            (Trend::Decreasing, MatchedRule::DownwardMomentum, -0.5, StrengthTier::High),
        ];

        for (trend, rule, percent_change, expected) in cases {
            let recommendation =
                map_recommendation(&label(trend, rule, percent_change, 0.1), &rules);
            assert_eq!(recommendation.strength, expected, "percent_change {percent_change}");
        }

        let on_jump_limit =
            map_recommendation(&label(Trend::Spiky, MatchedRule::ExtremeJump, 1.5, 0.3), &rules);
        assert_eq!(on_jump_limit.strength, StrengthTier::High);
    }

    #[test]
    fn stable_and_insufficient_map_to_fixed_low_tiers() {
        let rules = RuleConfig::default();

        let stable = StaticRecommendationMapper
            .recommend(&label(Trend::Stable, MatchedRule::StableBand, 0.05, 0.05), &rules);
        assert_eq!(stable.action, StockAction::MaintainStock);
        assert_eq!(stable.strength, StrengthTier::Low);

        let mut short = label(Trend::InsufficientData, MatchedRule::MinimumHistory, 0.0, 0.0);
        short.evidence.data_point_count = 2;
        let insufficient = StaticRecommendationMapper.recommend(&short, &rules);
        assert_eq!(insufficient.action, StockAction::ReviewData);
        assert_eq!(insufficient.strength, StrengthTier::Low);
        assert!(insufficient.rationale.contains("Insufficient history"));
        assert!(insufficient.rationale.contains("only 2 day(s)"));
    }

    #[test]
    fn spiky_reviews_with_medium_or_high_priority() {
        let rules = RuleConfig::default();

        let jump_label = label(Trend::Spiky, MatchedRule::ExtremeJump, 1.0588, 0.43);
        let jump = map_recommendation(&jump_label, &rules);
        assert_eq!(jump.action, StockAction::ReviewData);
        assert_eq!(jump.strength, StrengthTier::Medium);
        assert!(jump.rationale.contains("+105.9%"));
        assert!(jump.rationale.contains("75% single-day limit"));

        let erratic =
            map_recommendation(&label(Trend::Spiky, MatchedRule::HighVolatility, 0.1, 1.2), &rules);
        assert_eq!(erratic.strength, StrengthTier::High);
        assert!(erratic.rationale.contains("volatility index 1.20"));

        let extreme =
            map_recommendation(&label(Trend::Spiky, MatchedRule::ExtremeJump, 1.6, 0.45), &rules);
        assert_eq!(extreme.strength, StrengthTier::High);
    }

    #[test]
    fn rationale_is_built_from_the_evidence() {
        let rules = RuleConfig::default();
        let first = map_recommendation(
            &label(Trend::Increasing, MatchedRule::UpwardMomentum, 0.324, 0.13),
            &rules,
        );
        let second = map_recommendation(
            &label(Trend::Increasing, MatchedRule::UpwardMomentum, 0.40, 0.13),
            &rules,
        );

        assert!(first.rationale.contains("(132.4)"));
        assert!(first.rationale.contains("+32.4%"));
        assert!(first.rationale.contains("7-day average (100.0)"));
        assert!(first.rationale.contains("2 of the last 3"));
        assert_ne!(first.rationale, second.rationale);
        assert_eq!(first.evidence.product_id.as_str(), "lisinopril-10");
    }
}
