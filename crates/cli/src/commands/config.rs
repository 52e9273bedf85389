use std::env;
use std::fs;
use std::path::Path;

use demand_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

const COMMAND: &str = "config";

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    let file_path = resolve_config_path(config_path);
    let file_doc = load_config_file_doc(file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, file_doc.as_ref(), file_path.as_deref())
    };

    let engine = &config.engine;
    let strength = &engine.strength;
    let entries = [
        (
            "engine.window_size",
            engine.window_size.to_string(),
            source("engine.window_size", &["DEMAND_SIGNAL_WINDOW_SIZE"]),
        ),
        (
            "engine.min_data_points",
            engine.min_data_points.to_string(),
            source("engine.min_data_points", &["DEMAND_SIGNAL_MIN_DATA_POINTS"]),
        ),
        (
            "engine.increase_threshold",
            engine.increase_threshold.to_string(),
            threshold_source(
                &source,
                "engine.increase_threshold",
                "DEMAND_SIGNAL_INCREASE_THRESHOLD",
            ),
        ),
        (
            "engine.decrease_threshold",
            engine.decrease_threshold.to_string(),
            threshold_source(
                &source,
                "engine.decrease_threshold",
                "DEMAND_SIGNAL_DECREASE_THRESHOLD",
            ),
        ),
        (
            "engine.spiky_volatility_threshold",
            engine.spiky_volatility_threshold.to_string(),
            source(
                "engine.spiky_volatility_threshold",
                &["DEMAND_SIGNAL_SPIKY_VOLATILITY_THRESHOLD"],
            ),
        ),
        (
            "engine.spiky_jump_threshold",
            engine.spiky_jump_threshold.to_string(),
            source("engine.spiky_jump_threshold", &["DEMAND_SIGNAL_SPIKY_JUMP_THRESHOLD"]),
        ),
        (
            "engine.fill_missing_dates",
            engine.fill_missing_dates.to_string(),
            source("engine.fill_missing_dates", &["DEMAND_SIGNAL_FILL_MISSING_DATES"]),
        ),
        (
            "engine.strength.medium_excess",
            strength.medium_excess.to_string(),
            source("engine.strength.medium_excess", &[]),
        ),
        (
            "engine.strength.high_excess",
            strength.high_excess.to_string(),
            source("engine.strength.high_excess", &[]),
        ),
        (
            "engine.strength.high_volatility",
            strength.high_volatility.to_string(),
            source("engine.strength.high_volatility", &[]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["DEMAND_SIGNAL_LOGGING_LEVEL", "DEMAND_SIGNAL_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            source(
                "logging.format",
                &["DEMAND_SIGNAL_LOGGING_FORMAT", "DEMAND_SIGNAL_LOG_FORMAT"],
            ),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|(key, value, source)| render_line(key, &value, source)));
    CommandResult::plain(lines.join("\n"))
}

/// Directional thresholds can also come from the symmetric `stable_band` key.
fn threshold_source(
    source: &impl Fn(&str, &[&str]) -> String,
    key_path: &str,
    env_key: &str,
) -> String {
    let direct = source(key_path, &[env_key]);
    if direct != "default" {
        return direct;
    }
    source("engine.stable_band", &["DEMAND_SIGNAL_STABLE_BAND"])
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
