use std::fmt::Write as _;
use std::str::FromStr;

use chrono::NaiveDate;
use demand_core::{
    AggregationSummary, PipelineReport, ProductFailure, ProductOutcome, Recommendation,
    StockAction,
};
use serde::Serialize;

const RULE_WIDTH: usize = 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported report format `{other}` (expected text or json)")),
        }
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    report_date: NaiveDate,
    summary: &'a AggregationSummary,
    entries: &'a [ProductOutcome],
}

pub fn render(
    report: &PipelineReport,
    report_date: NaiveDate,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(render_text(report, report_date)),
        ReportFormat::Json => render_json(report, report_date),
    }
}

pub fn render_json(
    report: &PipelineReport,
    report_date: NaiveDate,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ReportDocument {
        report_date,
        summary: &report.summary,
        entries: &report.entries,
    })
}

/// Plain-text daily summary: aggregation counts, actions, then one block per
/// product sorted case-insensitively by product id.
pub fn render_text(report: &PipelineReport, report_date: NaiveDate) -> String {
    let mut out = String::new();
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    push(&mut out, format!("DAILY DEMAND SUMMARY REPORT - {}", report_date.format("%Y-%m-%d")));
    push(&mut out, &heavy);
    push(&mut out, "");

    let summary = &report.summary;
    push(&mut out, "Store Aggregation:");
    push(&mut out, format!("  - Stores detected   : {}", summary.store_count));
    push(&mut out, format!("  - Products detected : {}", summary.product_count));
    push(&mut out, format!("  - Days covered      : {}", summary.day_count));
    push(&mut out, format!("  - Input rows        : {}", summary.rows_in));
    push(&mut out, format!("  - Output rows       : {}", summary.rows_out));
    push(&mut out, "");

    push(&mut out, "Summary by Action:");
    let counts = [
        ("Products recommended to INCREASE stock", StockAction::IncreaseStock),
        ("Products recommended to REDUCE stock", StockAction::ReduceStock),
        ("Products to MAINTAIN stock", StockAction::MaintainStock),
        ("Products flagged for REVIEW", StockAction::ReviewData),
    ];
    for (label, action) in counts {
        push(&mut out, format!("  - {label:<39}: {}", report.count_action(action)));
    }
    let excluded: Vec<&ProductFailure> = report.failures().collect();
    if !excluded.is_empty() {
        let label = "Products EXCLUDED from analysis";
        push(&mut out, format!("  - {label:<39}: {}", excluded.len()));
    }
    push(&mut out, "");

    push(&mut out, &light);
    push(&mut out, "DETAILED PRODUCT-LEVEL INSIGHTS");
    push(&mut out, &light);
    push(&mut out, "");

    let mut recommendations: Vec<&Recommendation> = report.recommendations().collect();
    recommendations.sort_by_cached_key(|recommendation| {
        (recommendation.product_id.as_str().to_lowercase(), recommendation.product_id.clone())
    });
    for recommendation in recommendations {
        render_product(&mut out, recommendation);
    }

    if !excluded.is_empty() {
        push(&mut out, &light);
        push(&mut out, "EXCLUDED PRODUCTS");
        push(&mut out, &light);
        push(&mut out, "");
        for failure in excluded {
            push(&mut out, format!("Product: {}", failure.product_id));
            push(&mut out, format!("  Failed Stage         : {}", failure.stage));
            push(&mut out, format!("  Reason               : {}", single_line(&failure.message)));
            push(&mut out, "");
        }
    }

    out.truncate(out.trim_end().len());
    out
}

fn render_product(out: &mut String, recommendation: &Recommendation) {
    let evidence = &recommendation.evidence;
    push(out, format!("Product: {}", recommendation.product_id));
    push(out, format!("  Detected Trend       : {}", recommendation.trend));
    push(
        out,
        format!(
            "  Recent Sales         : last_day={:.1}, recent_avg={:.1}, change_vs_avg={:+.1}%",
            evidence.last_value,
            evidence.recent_average,
            evidence.percent_change_pct()
        ),
    );
    push(out, format!("  Data Points          : {}", evidence.data_point_count));
    push(out, format!("  Volatility Index     : {:.2}", evidence.volatility_index));
    push(
        out,
        format!(
            "  Recommended Action   : {} (strength: {})",
            recommendation.action.as_str().to_uppercase(),
            recommendation.strength
        ),
    );
    push(out, format!("  Reasoning            : {}", single_line(&recommendation.rationale)));
    push(out, "");
}

fn push(out: &mut String, line: impl AsRef<str>) {
    let _ = writeln!(out, "{}", line.as_ref());
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
