use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["demand-signal.toml", "config/demand-signal.toml"];

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub engine: RuleConfig,
    pub logging: LoggingConfig,
}

/// Immutable rule set handed to every pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Trailing days used for feature extraction.
    pub window_size: usize,
    /// Below this many points a product is labelled insufficient_data.
    pub min_data_points: usize,
    pub increase_threshold: f64,
    pub decrease_threshold: f64,
    /// Coefficient of variation above which demand is spiky.
    pub spiky_volatility_threshold: f64,
    /// Absolute last-day change versus the average above which demand is spiky.
    pub spiky_jump_threshold: f64,
    /// Synthesize zero totals for calendar gaps inside a product's history.
    pub fill_missing_dates: bool,
    pub strength: StrengthTiers,
}

/// Cut-offs that bucket a recommendation into low/medium/high.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrengthTiers {
    /// Change beyond the directional threshold needed for a medium tier.
    pub medium_excess: f64,
    /// Change beyond the directional threshold needed for a high tier.
    pub high_excess: f64,
    /// Volatility index at which a spiky product is reviewed with high priority.
    pub high_volatility: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub window_size: Option<usize>,
    pub min_data_points: Option<usize>,
    pub stable_band: Option<f64>,
    pub spiky_volatility_threshold: Option<f64>,
    pub spiky_jump_threshold: Option<f64>,
    pub fill_missing_dates: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            window_size: 7,
            min_data_points: 3,
            increase_threshold: 0.20,
            decrease_threshold: -0.20,
            spiky_volatility_threshold: 0.50,
            spiky_jump_threshold: 0.75,
            fill_missing_dates: false,
            strength: StrengthTiers::default(),
        }
    }
}

impl Default for StrengthTiers {
    fn default() -> Self {
        Self { medium_excess: 0.10, high_excess: 0.30, high_volatility: 1.00 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { engine: RuleConfig::default(), logging: LoggingConfig::default() }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl RuleConfig {
    /// Sets both directional thresholds to `+band` / `-band`.
    pub fn with_stable_band(mut self, band: f64) -> Self {
        self.set_stable_band(band);
        self
    }

    fn set_stable_band(&mut self, band: f64) {
        self.increase_threshold = band.abs();
        self.decrease_threshold = -band.abs();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Validation(
                "engine.window_size must be greater than zero".to_string(),
            ));
        }

        if self.min_data_points == 0 {
            return Err(ConfigError::Validation(
                "engine.min_data_points must be greater than zero".to_string(),
            ));
        }

        if self.window_size < self.min_data_points {
            return Err(ConfigError::Validation(format!(
                "engine.window_size ({}) must be >= engine.min_data_points ({})",
                self.window_size, self.min_data_points
            )));
        }

        require_positive("engine.increase_threshold", self.increase_threshold)?;
        require_positive("engine.decrease_threshold (negated)", -self.decrease_threshold)?;
        require_positive("engine.spiky_volatility_threshold", self.spiky_volatility_threshold)?;
        require_positive("engine.spiky_jump_threshold", self.spiky_jump_threshold)?;

        let tiers = &self.strength;
        if !tiers.medium_excess.is_finite() || tiers.medium_excess < 0.0 {
            return Err(ConfigError::Validation(
                "engine.strength.medium_excess must be a finite value >= 0".to_string(),
            ));
        }
        if !tiers.high_excess.is_finite() || tiers.high_excess < tiers.medium_excess {
            return Err(ConfigError::Validation(
                "engine.strength.high_excess must be >= engine.strength.medium_excess".to_string(),
            ));
        }
        require_positive("engine.strength.high_volatility", tiers.high_volatility)?;

        Ok(())
    }
}

fn require_positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must be a finite value > 0, got {value}")))
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            if let Some(window_size) = engine.window_size {
                self.engine.window_size = window_size;
            }
            if let Some(min_data_points) = engine.min_data_points {
                self.engine.min_data_points = min_data_points;
            }
            // explicit thresholds win over the symmetric band
            if let Some(stable_band) = engine.stable_band {
                self.engine.set_stable_band(stable_band);
            }
            if let Some(increase_threshold) = engine.increase_threshold {
                self.engine.increase_threshold = increase_threshold;
            }
            if let Some(decrease_threshold) = engine.decrease_threshold {
                self.engine.decrease_threshold = decrease_threshold;
            }
            if let Some(threshold) = engine.spiky_volatility_threshold {
                self.engine.spiky_volatility_threshold = threshold;
            }
            if let Some(threshold) = engine.spiky_jump_threshold {
                self.engine.spiky_jump_threshold = threshold;
            }
            if let Some(fill_missing_dates) = engine.fill_missing_dates {
                self.engine.fill_missing_dates = fill_missing_dates;
            }
            if let Some(strength) = engine.strength {
                if let Some(medium_excess) = strength.medium_excess {
                    self.engine.strength.medium_excess = medium_excess;
                }
                if let Some(high_excess) = strength.high_excess {
                    self.engine.strength.high_excess = high_excess;
                }
                if let Some(high_volatility) = strength.high_volatility {
                    self.engine.strength.high_volatility = high_volatility;
                }
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DEMAND_SIGNAL_WINDOW_SIZE") {
            self.engine.window_size = parse_env("DEMAND_SIGNAL_WINDOW_SIZE", &value)?;
        }
        if let Some(value) = read_env("DEMAND_SIGNAL_MIN_DATA_POINTS") {
            self.engine.min_data_points = parse_env("DEMAND_SIGNAL_MIN_DATA_POINTS", &value)?;
        }
        if let Some(value) = read_env("DEMAND_SIGNAL_STABLE_BAND") {
            let band: f64 = parse_env("DEMAND_SIGNAL_STABLE_BAND", &value)?;
            self.engine.set_stable_band(band);
        }
        if let Some(value) = read_env("DEMAND_SIGNAL_INCREASE_THRESHOLD") {
            self.engine.increase_threshold = parse_env("DEMAND_SIGNAL_INCREASE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("DEMAND_SIGNAL_DECREASE_THRESHOLD") {
            self.engine.decrease_threshold = parse_env("DEMAND_SIGNAL_DECREASE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("DEMAND_SIGNAL_SPIKY_VOLATILITY_THRESHOLD") {
            self.engine.spiky_volatility_threshold =
                parse_env("DEMAND_SIGNAL_SPIKY_VOLATILITY_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("DEMAND_SIGNAL_SPIKY_JUMP_THRESHOLD") {
            self.engine.spiky_jump_threshold =
                parse_env("DEMAND_SIGNAL_SPIKY_JUMP_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("DEMAND_SIGNAL_FILL_MISSING_DATES") {
            self.engine.fill_missing_dates = parse_env("DEMAND_SIGNAL_FILL_MISSING_DATES", &value)?;
        }

        let log_level = read_env("DEMAND_SIGNAL_LOGGING_LEVEL")
            .or_else(|| read_env("DEMAND_SIGNAL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("DEMAND_SIGNAL_LOGGING_FORMAT")
            .or_else(|| read_env("DEMAND_SIGNAL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(window_size) = overrides.window_size {
            self.engine.window_size = window_size;
        }
        if let Some(min_data_points) = overrides.min_data_points {
            self.engine.min_data_points = min_data_points;
        }
        if let Some(stable_band) = overrides.stable_band {
            self.engine.set_stable_band(stable_band);
        }
        if let Some(threshold) = overrides.spiky_volatility_threshold {
            self.engine.spiky_volatility_threshold = threshold;
        }
        if let Some(threshold) = overrides.spiky_jump_threshold {
            self.engine.spiky_jump_threshold = threshold;
        }
        if let Some(fill_missing_dates) = overrides.fill_missing_dates {
            self.engine.fill_missing_dates = fill_missing_dates;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Returns the config file that `AppConfig::load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || !matches!(chars.peek(), Some('{')) {
            output.push(ch);
            continue;
        }

        chars.next();
        let mut key = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(next) => key.push(next),
                None => return Err(ConfigError::UnterminatedInterpolation),
            }
        }

        let value =
            env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
        output.push_str(&value);
    }

    Ok(output)
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    engine: Option<EnginePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnginePatch {
    window_size: Option<usize>,
    min_data_points: Option<usize>,
    stable_band: Option<f64>,
    increase_threshold: Option<f64>,
    decrease_threshold: Option<f64>,
    spiky_volatility_threshold: Option<f64>,
    spiky_jump_threshold: Option<f64>,
    fill_missing_dates: Option<bool>,
    strength: Option<StrengthPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrengthPatch {
    medium_excess: Option<f64>,
    high_excess: Option<f64>,
    high_volatility: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
