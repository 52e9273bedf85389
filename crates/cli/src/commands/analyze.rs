use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Args;
use demand_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use demand_core::{DefaultPipeline, PipelineError, PipelineInput, PipelineRuntime};

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_INPUT, EXIT_OUTPUT};
use crate::{init_logging, loader, report};

const COMMAND: &str = "analyze";

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    #[arg(long, short = 'i', help = "Daily sales CSV (store_id, product_id, date, quantity_sold)")]
    pub input: PathBuf,
    #[arg(long, short = 'o', help = "Write the report to this file instead of stdout")]
    pub output: Option<PathBuf>,
    #[arg(long, default_value = "text", help = "Report format: text or json")]
    pub format: report::ReportFormat,
    #[arg(long, help = "Date printed in the report header (YYYY-MM-DD, defaults to today)")]
    pub report_date: Option<NaiveDate>,
    #[arg(long, help = "Trailing days used for feature extraction")]
    pub window_size: Option<usize>,
    #[arg(long, help = "Minimum days of history before a trend is assigned")]
    pub min_data_points: Option<usize>,
    #[arg(long, help = "Symmetric increase/decrease threshold, e.g. 0.2 for +/-20%")]
    pub stable_band: Option<f64>,
    #[arg(long, help = "Volatility index above which demand is spiky")]
    pub spiky_volatility: Option<f64>,
    #[arg(long, help = "Absolute last-day change versus the average above which demand is spiky")]
    pub spiky_jump: Option<f64>,
    #[arg(long, help = "Treat calendar gaps inside a product's history as zero-sales days")]
    pub fill_missing_dates: bool,
    #[arg(long, help = "Explicit TOML config file (must exist)")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Log level written to stderr: trace|debug|info|warn|error")]
    pub log_level: Option<String>,
    #[arg(long, help = "Log format written to stderr: compact|pretty|json")]
    pub log_format: Option<LogFormat>,
}

impl AnalyzeArgs {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            format: report::ReportFormat::Text,
            report_date: None,
            window_size: None,
            min_data_points: None,
            stable_band: None,
            spiky_volatility: None,
            spiky_jump: None,
            fill_missing_dates: false,
            config: None,
            log_level: None,
            log_format: None,
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                window_size: self.window_size,
                min_data_points: self.min_data_points,
                stable_band: self.stable_band,
                spiky_volatility_threshold: self.spiky_volatility,
                spiky_jump_threshold: self.spiky_jump,
                fill_missing_dates: self.fill_missing_dates.then_some(true),
                log_level: self.log_level.clone(),
                log_format: self.log_format,
            },
        }
    }
}

pub fn run(args: &AnalyzeArgs) -> CommandResult {
    let config = match AppConfig::load(args.load_options()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };
    init_logging(&config.logging);

    let records = match loader::load_sales_file(&args.input) {
        Ok(records) => records,
        Err(error) => {
            tracing::error!(
                event_name = "cli.analyze.input_rejected",
                input = %args.input.display(),
                error = %error,
                "sales input rejected"
            );
            return CommandResult::failure(
                COMMAND,
                "input_validation",
                error.to_string(),
                EXIT_INPUT,
            );
        }
    };

    let pipeline = DefaultPipeline::default();
    let outcome = match pipeline.run(PipelineInput { records: &records, rules: &config.engine }) {
        Ok(outcome) => outcome,
        Err(error) => {
            let exit_code = match error {
                PipelineError::Configuration(_) => EXIT_CONFIG,
                PipelineError::Validation(_) => EXIT_INPUT,
            };
            return CommandResult::failure(
                COMMAND,
                error.error_class(),
                error.to_string(),
                exit_code,
            );
        }
    };

    let report_date = args.report_date.unwrap_or_else(|| Local::now().date_naive());
    let rendered = match report::render(&outcome, report_date, args.format) {
        Ok(rendered) => rendered,
        Err(error) => {
            return CommandResult::failure(COMMAND, "serialization", error.to_string(), 1);
        }
    };

    let Some(output_path) = args.output.as_deref() else {
        return CommandResult::plain(rendered);
    };

    match write_report(output_path, &rendered) {
        Ok(()) => {
            tracing::info!(
                event_name = "cli.analyze.report_written",
                output = %output_path.display(),
                products = outcome.entries.len(),
                "report written"
            );
            CommandResult::success(
                COMMAND,
                format!(
                    "report for {} product(s) written to {}",
                    outcome.entries.len(),
                    output_path.display()
                ),
            )
        }
        Err(error) => {
            CommandResult::failure(COMMAND, "output_write", format!("{error:#}"), EXIT_OUTPUT)
        }
    }
}

fn write_report(path: &Path, rendered: &str) -> anyhow::Result<()> {
    fs::write(path, rendered)
        .with_context(|| format!("failed to write report to `{}`", path.display()))
}
