use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SynthesisError};
use crate::health::HealthPolicy;
use crate::lag::LagPolicy;

pub const DEFAULT_ACCOUNT_ID: &str = "123456789012";
pub const DEFAULT_DOMAIN: &str = "INFRA";
pub const DEFAULT_PROVIDER: &str = "aws-msk";
pub const DEFAULT_CLUSTER_NAME: &str = "default-kafka-cluster";

const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SynthesisConfig {
    pub account_id: String,
    pub domain: String,
    pub provider: String,
    pub default_cluster_name: String,
    pub enable_validation: bool,
    pub enable_per_topic_broker_metrics: bool,
    pub strict_mode: bool,
    /// Extra attempts per sample in lenient mode; ignored when strict
    pub retry_attempts: u32,
    pub health: HealthPolicy,
    pub lag: LagPolicy,
}

impl SynthesisConfig {
    /// Load a YAML (or JSON) config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SynthesisError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: SynthesisConfig = serde_yaml::from_str(&content)
            .map_err(|e| SynthesisError::config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `SYNTH_` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay `SYNTH_` environment variables onto this config
    pub fn apply_env(&mut self) {
        if let Ok(account_id) = std::env::var("SYNTH_ACCOUNT_ID") {
            self.account_id = account_id;
        }
        if let Ok(domain) = std::env::var("SYNTH_DOMAIN") {
            self.domain = domain;
        }
        if let Ok(provider) = std::env::var("SYNTH_PROVIDER") {
            self.provider = provider;
        }
        if let Ok(cluster) = std::env::var("SYNTH_CLUSTER_NAME") {
            self.default_cluster_name = cluster;
        }
        if let Ok(strict) = std::env::var("SYNTH_STRICT_MODE") {
            self.strict_mode = parse_flag(&strict).unwrap_or(self.strict_mode);
        }
        if let Ok(validation) = std::env::var("SYNTH_ENABLE_VALIDATION") {
            self.enable_validation = parse_flag(&validation).unwrap_or(self.enable_validation);
        }
        if let Ok(per_broker) = std::env::var("SYNTH_PER_TOPIC_BROKER_METRICS") {
            self.enable_per_topic_broker_metrics =
                parse_flag(&per_broker).unwrap_or(self.enable_per_topic_broker_metrics);
        }
        if let Ok(retries) = std::env::var("SYNTH_RETRY_ATTEMPTS") {
            self.retry_attempts = retries.trim().parse().unwrap_or(self.retry_attempts);
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| SynthesisError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SynthesisError::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("account_id", &self.account_id),
            ("domain", &self.domain),
            ("provider", &self.provider),
            ("default_cluster_name", &self.default_cluster_name),
        ] {
            if value.trim().is_empty() {
                return Err(SynthesisError::config(format!("{} must not be empty", label)));
            }
        }

        if self.account_id.contains('|') || self.domain.contains('|') {
            return Err(SynthesisError::config(
                "account_id and domain must not contain '|'",
            ));
        }

        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(SynthesisError::config(format!(
                "retry_attempts {} exceeds the maximum of {}",
                self.retry_attempts, MAX_RETRY_ATTEMPTS
            )));
        }

        let health = &self.health;
        let lag = &self.lag;
        let numbers = [
            ("health.offline_partition_penalty", health.offline_partition_penalty),
            ("health.offline_partition_cap", health.offline_partition_cap),
            ("health.offline_broker_penalty", health.offline_broker_penalty),
            ("health.under_replicated_penalty", health.under_replicated_penalty),
            ("health.under_replicated_cap", health.under_replicated_cap),
            ("health.cpu_threshold_percent", health.cpu_threshold_percent),
            ("health.cpu_penalty", health.cpu_penalty),
            ("health.memory_threshold_percent", health.memory_threshold_percent),
            ("health.memory_penalty", health.memory_penalty),
            ("health.idle_floor_percent", health.idle_floor_percent),
            ("health.network_idle_penalty", health.network_idle_penalty),
            ("health.request_idle_penalty", health.request_idle_penalty),
            ("health.lag_threshold", health.lag_threshold),
            ("health.lag_ramp", health.lag_ramp),
            ("health.lag_penalty_cap", health.lag_penalty_cap),
            ("lag.trend_threshold_percent", lag.trend_threshold_percent),
            ("lag.total_lag_threshold", lag.total_lag_threshold),
            ("lag.total_lag_penalty", lag.total_lag_penalty),
            ("lag.max_lag_threshold", lag.max_lag_threshold),
            ("lag.max_lag_penalty", lag.max_lag_penalty),
            ("lag.increasing_penalty", lag.increasing_penalty),
        ];
        for (label, value) in numbers {
            if !value.is_finite() || value < 0.0 {
                return Err(SynthesisError::config(format!(
                    "{} must be a non-negative number, got {}",
                    label, value
                )));
            }
        }

        Ok(())
    }

    /// Attempts allowed per sample, counting the first
    pub fn max_attempts(&self) -> u32 {
        if self.strict_mode {
            1
        } else {
            1 + self.retry_attempts
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            default_cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            enable_validation: true,
            enable_per_topic_broker_metrics: true,
            strict_mode: false,
            retry_attempts: 1,
            health: HealthPolicy::default(),
            lag: LagPolicy::default(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = SynthesisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts(), 2);
        assert_eq!(config.domain, "INFRA");
    }

    #[test]
    fn test_strict_mode_disables_retries() {
        let config = SynthesisConfig {
            strict_mode: true,
            retry_attempts: 3,
            ..Default::default()
        };
        assert_eq!(config.max_attempts(), 1);
    }

    #[test]
    fn test_validation_failures() {
        let config = SynthesisConfig {
            domain: "IN|FRA".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = SynthesisConfig::default();
        config.health.cpu_penalty = -1.0;
        assert!(config.validate().is_err());

        let config = SynthesisConfig {
            retry_attempts: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_partial_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "account_id: \"999\"\nstrict_mode: true\nlag:\n  increasing_penalty: 40\n").unwrap();

        let config = SynthesisConfig::load(file.path()).unwrap();
        assert_eq!(config.account_id, "999");
        assert!(config.strict_mode);
        assert_eq!(config.lag.increasing_penalty, 40.0);
        assert_eq!(config.lag.total_lag_threshold, 1000.0);
        assert_eq!(config.provider, DEFAULT_PROVIDER);

        let out = NamedTempFile::new().unwrap();
        config.save(out.path()).unwrap();
        assert_eq!(SynthesisConfig::load(out.path()).unwrap(), config);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.yaml");
        assert_eq!(SynthesisConfig::load(path).unwrap(), SynthesisConfig::default());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
