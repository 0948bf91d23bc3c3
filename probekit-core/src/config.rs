//! Configuration types for probe evaluation runs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::concurrency::RetryConfig;
use crate::error::{ProbekitError, Result};
use crate::judge::AggregateMethod;

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "PROBEKIT_CONFIG_PATH";

/// Prefix for environment overrides (`PROBEKIT_EXECUTION__MAX_CONCURRENCY=8`)
pub const ENV_PREFIX: &str = "PROBEKIT_";

/// Main configuration for an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EvalConfig {
    /// Probe execution scheduling
    pub execution: ExecutionConfig,

    /// Detection tunables
    pub detection: DetectionConfig,

    /// Quality judge sampling
    pub judge: JudgeConfig,

    /// Where checkpoints and summaries are written
    pub output: OutputConfig,

    /// Per-model pricing overrides, keyed `provider:model` or `provider:*`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub pricing: HashMap<String, ModelPricing>,
}

/// Execution stage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum probes in flight
    pub max_concurrency: usize,

    /// Per-attempt timeout for one probe execution
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Keep going when individual probes fail
    pub continue_on_error: bool,

    /// Dispatch rate cap shared by all probes (unset = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<f64>,

    /// Times each probe is executed; above 1 enables flakiness stats
    pub repetitions: u32,

    /// Probes executed between partial checkpoints
    pub checkpoint_interval: usize,

    /// Backoff policy for transient executor failures
    pub retry: RetryConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            timeout: Duration::from_secs(120),
            continue_on_error: true,
            requests_per_second: None,
            repetitions: 1,
            checkpoint_interval: 10,
            retry: RetryConfig::default(),
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum token length for two component names to count as sharing a
    /// domain (minor rather than major conflict)
    pub min_shared_token_len: usize,

    /// Confidence assigned to transcript-fallback detections (0-100)
    pub transcript_confidence: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_shared_token_len: 4,
            transcript_confidence: 90,
        }
    }
}

/// When the quality judge is consulted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeMode {
    /// Judge every successfully executed probe
    Always,
    /// Judge only probes detection cannot settle on its own
    #[default]
    ProgrammaticFirst,
}

/// Judge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Enable quality judging
    pub enabled: bool,

    pub mode: JudgeMode,

    /// Independent judgments per probe (1-5)
    pub num_samples: usize,

    /// How numeric scores are combined
    pub aggregate_method: AggregateMethod,

    /// Model identifier handed to the judge
    pub model: String,

    pub max_tokens: u32,

    pub temperature: f64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: JudgeMode::ProgrammaticFirst,
            num_samples: 1,
            aggregate_method: AggregateMethod::Average,
            model: "default".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

impl JudgeConfig {
    /// Multi-sample statistics apply only when more than one judgment is drawn
    pub fn is_multi_sample(&self) -> bool {
        self.enabled && self.num_samples > 1
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for per-run state and summaries
    pub results_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("./results"),
        }
    }
}

/// USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl EvalConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `probekit.toml` in the working directory
    /// 3. The file named by `PROBEKIT_CONFIG_PATH`, if set
    /// 4. `PROBEKIT_`-prefixed environment variables (`__` separates sections)
    ///
    /// # Errors
    ///
    /// Returns an error if a file is invalid or the merged result fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(EvalConfig::default()))
            .merge(Toml::file("probekit.toml"));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }

        let config: EvalConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config_path"]).split("__"))
            .extract()
            .map_err(|e| {
                ProbekitError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: EvalConfig = Figment::from(Serialized::defaults(EvalConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                ProbekitError::Configuration(format!(
                    "Failed to load configuration file {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ProbekitError::Configuration(msg));
        let execution = &self.execution;

        if execution.max_concurrency == 0 {
            return invalid("execution.max_concurrency must be at least 1".into());
        }
        if execution.repetitions == 0 {
            return invalid("execution.repetitions must be at least 1".into());
        }
        if execution.checkpoint_interval == 0 {
            return invalid("execution.checkpoint_interval must be at least 1".into());
        }
        if let Some(rps) = execution.requests_per_second {
            if !(rps > 0.0) {
                return invalid(format!(
                    "execution.requests_per_second must be positive, got {rps}"
                ));
            }
        }

        let retry = &execution.retry;
        if retry.max_attempts == 0 {
            return invalid("execution.retry.max_attempts must be at least 1".into());
        }
        if retry.backoff_multiplier < 1.0 {
            return invalid(format!(
                "execution.retry.backoff_multiplier must be >= 1.0, got {}",
                retry.backoff_multiplier
            ));
        }
        if !(0.0..=1.0).contains(&retry.jitter) {
            return invalid(format!(
                "execution.retry.jitter must be within 0..=1, got {}",
                retry.jitter
            ));
        }

        if !(1..=5).contains(&self.judge.num_samples) {
            return invalid(format!(
                "judge.num_samples must be within 1..=5, got {}",
                self.judge.num_samples
            ));
        }
        if self.detection.transcript_confidence > 100 {
            return invalid("detection.transcript_confidence must be at most 100".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EvalConfig::default();
        config.validate().unwrap();
        assert_eq!(config.execution.max_concurrency, 5);
        assert_eq!(config.judge.num_samples, 1);
        assert_eq!(config.judge.mode, JudgeMode::ProgrammaticFirst);
        assert!(!config.judge.is_multi_sample());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EvalConfig::default();
        config.judge.num_samples = 6;
        assert!(matches!(config.validate(), Err(ProbekitError::Configuration(_))));

        let mut config = EvalConfig::default();
        config.execution.max_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.execution.requests_per_second = Some(0.0);
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.execution.retry.jitter = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "eval.toml",
                r#"
                [execution]
                max_concurrency = 8
                timeout = "30s"
                requests_per_second = 2.5

                [execution.retry]
                max_attempts = 5
                initial_delay = "250ms"

                [judge]
                num_samples = 3
                aggregate_method = "median"

                [pricing."acme:judge-large"]
                input_per_million = 3.0
                output_per_million = 15.0
                "#,
            )?;

            let config = EvalConfig::from_file("eval.toml").expect("config loads");
            assert_eq!(config.execution.max_concurrency, 8);
            assert_eq!(config.execution.timeout, Duration::from_secs(30));
            assert_eq!(config.execution.requests_per_second, Some(2.5));
            assert_eq!(config.execution.retry.max_attempts, 5);
            assert_eq!(config.execution.retry.initial_delay, Duration::from_millis(250));
            assert_eq!(config.judge.aggregate_method, AggregateMethod::Median);
            assert!(config.judge.is_multi_sample());
            assert_eq!(config.pricing["acme:judge-large"].output_per_million, 15.0);
            // Untouched sections keep defaults
            assert_eq!(config.detection, DetectionConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_with_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("probekit.toml", "[execution]\nmax_concurrency = 2\n")?;
            jail.set_env("PROBEKIT_EXECUTION__MAX_CONCURRENCY", "7");
            jail.set_env("PROBEKIT_JUDGE__ENABLED", "false");

            let config = EvalConfig::load().expect("config loads");
            assert_eq!(config.execution.max_concurrency, 7);
            assert!(!config.judge.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_file_is_configuration_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[judge]\nnum_samples = 9\n")?;
            let err = EvalConfig::from_file("bad.toml").unwrap_err();
            assert!(err.to_string().contains("num_samples"));
            Ok(())
        });
    }
}
