//! Configuration module for the rebalancer.
//!
//! Provides YAML configuration loading, validation, and environment variable
//! interpolation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rebalancer::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::policy::PolicyConfig;
use crate::infrastructure::broker::alpaca::{AlpacaConfig, AlpacaEnvironment, RetryConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Recommendation source files (JSON), merged in order.
    pub recommendations: Vec<PathBuf>,
    /// Evaluate and report without submitting orders.
    #[serde(default)]
    pub dry_run: bool,
    /// Risk policy configuration.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Broker configuration.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrokerConfig {
    /// Alpaca broker configuration.
    #[serde(default)]
    pub alpaca: AlpacaSettings,
}

/// Alpaca broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaSettings {
    /// API key (from environment variable).
    #[serde(default)]
    pub api_key: String,
    /// API secret (from environment variable).
    #[serde(default)]
    pub api_secret: String,
    /// Trading environment: "paper" or "live".
    #[serde(default = "default_alpaca_environment")]
    pub environment: String,
    /// Base URL override for both APIs (tests, proxies).
    #[serde(default)]
    pub base_url: Option<String>,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for AlpacaSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            environment: default_alpaca_environment(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

impl AlpacaSettings {
    /// Build the adapter configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the environment name is unrecognized.
    pub fn to_alpaca_config(&self) -> Result<AlpacaConfig, ConfigError> {
        let environment = match self.environment.to_lowercase().as_str() {
            "paper" => AlpacaEnvironment::Paper,
            "live" => AlpacaEnvironment::Live,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "broker.alpaca.environment must be 'paper' or 'live', got '{other}'"
                )));
            }
        };

        let mut config = AlpacaConfig::new(self.api_key.clone(), self.api_secret.clone(), environment)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(self.retry.to_retry_config());
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        Ok(config)
    }
}

fn default_alpaca_environment() -> String {
    "paper".to_string()
}
const fn default_timeout_secs() -> u64 {
    30
}

/// Retry policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum number of attempts.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Maximum backoff in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Backoff multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetrySettings {
    /// Convert to the adapter's retry configuration.
    #[must_use]
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}
const fn default_initial_backoff_ms() -> u64 {
    100
}
const fn default_max_backoff_ms() -> u64 {
    10_000
}
const fn default_multiplier() -> f64 {
    2.0
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    let interpolated = interpolate_env_vars(&contents);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let mut result = input.to_string();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    for cap in re.captures_iter(input) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let Some(var_match) = cap.get(1) else {
            continue;
        };
        let full_match = full_match.as_str();
        let var_name = var_match.as_str();
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        };

        result = result.replace(full_match, &value);
    }

    result
}

/// Validate configuration values.
///
/// The entry and exit confidence thresholds are validated as independent
/// ranges; their relative ordering is the hysteresis band and is
/// deliberately unconstrained.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    use rust_decimal::Decimal;

    if config.recommendations.is_empty() {
        return Err(ConfigError::ValidationError(
            "recommendations must list at least one source file".to_string(),
        ));
    }

    let policy = &config.policy;
    if policy.max_portfolio_size == 0 {
        return Err(ConfigError::ValidationError(
            "policy.max_portfolio_size must be at least 1".to_string(),
        ));
    }
    if policy.max_position_usd <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "policy.max_position_usd must be positive".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&policy.min_confidence) {
        return Err(ConfigError::ValidationError(
            "policy.min_confidence must be between 0.0 and 1.0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&policy.exit_below_confidence) {
        return Err(ConfigError::ValidationError(
            "policy.exit_below_confidence must be between 0.0 and 1.0".to_string(),
        ));
    }
    if policy.stop_loss_pct <= Decimal::ZERO || policy.stop_loss_pct >= Decimal::ONE {
        return Err(ConfigError::ValidationError(
            "policy.stop_loss_pct must be between 0 and 1 exclusive".to_string(),
        ));
    }
    if policy.take_profit_pct <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "policy.take_profit_pct must be positive".to_string(),
        ));
    }
    if policy.max_stop_loss_pct <= Decimal::ZERO || policy.max_stop_loss_pct > Decimal::ONE {
        return Err(ConfigError::ValidationError(
            "policy.max_stop_loss_pct must be between 0 exclusive and 1 inclusive".to_string(),
        ));
    }

    let alpaca = &config.broker.alpaca;
    // Environment name check happens here so a typo fails at load, not at
    // adapter construction.
    alpaca.to_alpaca_config().map(|_| ())?;
    if alpaca.api_key.is_empty() || alpaca.api_secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "broker.alpaca.api_key and api_secret must be set".to_string(),
        ));
    }
    if alpaca.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "broker.alpaca.retry.max_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL_YAML: &str = r"
recommendations:
  - recs/picks.json
broker:
  alpaca:
    api_key: test-key
    api_secret: test-secret
";

    #[test]
    fn load_minimal_config_uses_defaults() {
        let config = match load_config_from_string(MINIMAL_YAML) {
            Ok(c) => c,
            Err(e) => panic!("should load minimal config: {e}"),
        };
        assert!(!config.dry_run);
        assert_eq!(config.policy.max_portfolio_size, 5);
        assert_eq!(config.policy.max_position_usd, dec!(1000));
        assert_eq!(config.broker.alpaca.environment, "paper");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn full_config_parse() {
        let yaml = r#"
recommendations:
  - recs/momentum.json
  - recs/whales.json
dry_run: true
policy:
  max_portfolio_size: 8
  max_position_usd: 2500
  min_confidence: 0.65
  exit_below_confidence: 0.4
  stop_loss_pct: 0.08
  take_profit_pct: 0.15
broker:
  alpaca:
    api_key: key
    api_secret: secret
    environment: live
    timeout_secs: 10
    retry:
      max_attempts: 5
logging:
  level: "debug"
"#;

        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load full config: {e}"),
        };
        assert_eq!(config.recommendations.len(), 2);
        assert!(config.dry_run);
        assert_eq!(config.policy.max_portfolio_size, 8);
        assert_eq!(config.policy.max_position_usd, dec!(2500));
        assert!((config.policy.min_confidence - 0.65).abs() < f64::EPSILON);
        assert_eq!(config.broker.alpaca.environment, "live");
        assert_eq!(config.broker.alpaca.timeout_secs, 10);
        assert_eq!(config.broker.alpaca.retry.max_attempts, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn hysteresis_band_thresholds_are_not_coupled() {
        // exit_below_confidence above min_confidence is unusual but legal.
        let yaml = r"
recommendations:
  - recs/picks.json
policy:
  min_confidence: 0.5
  exit_below_confidence: 0.8
broker:
  alpaca:
    api_key: key
    api_secret: secret
";
        assert!(load_config_from_string(yaml).is_ok());
    }

    #[test]
    fn missing_recommendations_rejected() {
        let yaml = r"
recommendations: []
broker:
  alpaca:
    api_key: key
    api_secret: secret
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for empty recommendations");
        };
        assert!(err.to_string().contains("recommendations"));
    }

    #[test]
    fn missing_credentials_rejected() {
        let yaml = r"
recommendations:
  - recs/picks.json
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for missing credentials");
        };
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn invalid_environment_rejected() {
        let yaml = r"
recommendations:
  - recs/picks.json
broker:
  alpaca:
    api_key: key
    api_secret: secret
    environment: backtest
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for invalid environment");
        };
        assert!(err.to_string().contains("environment"));
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let yaml = r"
recommendations:
  - recs/picks.json
policy:
  min_confidence: 1.5
broker:
  alpaca:
    api_key: key
    api_secret: secret
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for invalid min_confidence");
        };
        assert!(err.to_string().contains("min_confidence"));
    }

    #[test]
    fn zero_portfolio_size_rejected() {
        let yaml = r"
recommendations:
  - recs/picks.json
policy:
  max_portfolio_size: 0
broker:
  alpaca:
    api_key: key
    api_secret: secret
";
        assert!(load_config_from_string(yaml).is_err());
    }

    #[test]
    fn env_var_with_default_when_missing() {
        let input = "level: ${REBALANCER_CONFIG_TEST_NONEXISTENT_VAR:-info}";
        let result = interpolate_env_vars(input);
        assert_eq!(result, "level: info");
    }

    #[test]
    #[expect(clippy::literal_string_with_formatting_args)] // ${...} is env var syntax, not format args
    fn env_var_with_default_uses_existing() {
        // PATH should always exist
        let input = "path: ${PATH:-default}";
        let result = interpolate_env_vars(input);
        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn env_var_without_default_becomes_empty() {
        let input = "api_key: ${REBALANCER_CONFIG_TEST_UNLIKELY_TO_EXIST}";
        let result = interpolate_env_vars(input);
        assert_eq!(result, "api_key: ");
    }

    #[test]
    fn settings_convert_to_adapter_config() {
        let settings = AlpacaSettings {
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
            environment: "live".to_string(),
            base_url: Some("http://127.0.0.1:8080".to_string()),
            timeout_secs: 5,
            retry: RetrySettings::default(),
        };
        let config = settings.to_alpaca_config().unwrap();
        assert!(config.environment.is_live());
        assert_eq!(config.trading_base_url(), "http://127.0.0.1:8080");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
