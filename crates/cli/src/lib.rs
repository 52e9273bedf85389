pub mod commands;
pub mod loader;
pub mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use demand_core::config::{LogFormat, LoggingConfig};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "demand-signal",
    about = "Daily demand signal report for multi-store sales",
    long_about = "Aggregate store-level daily sales per product, classify each product's recent demand trend, and recommend a stocking action.",
    after_help = "Examples:\n  demand-signal analyze --input sales.csv\n  demand-signal analyze --input sales.csv --format json --output report.json\n  demand-signal config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Analyze a daily sales CSV and print the demand summary report")]
    Analyze(commands::analyze::AnalyzeArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config {
        #[arg(long, help = "Explicit TOML config file (must exist)")]
        config: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Analyze(args) => commands::analyze::run(&args),
        Command::Config { config } => commands::config::run(config.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber on stderr so stdout only carries command
/// output. A second call is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
