//! broker.toml configuration parser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::CredentialType;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to parse catalog: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// The only credential helper built into the broker.
pub const DEFAULT_CRED_HELPER: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dashboard_redirect_uri: String,
    pub catalog_path: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub default_credential_type: CredentialType,
    #[serde(default = "default_cred_helper")]
    pub cred_helper_impl: String,
    pub scheduler: SchedulerConfig,
    pub metrics_forwarder: MetricsForwarderConfig,
    #[serde(default)]
    pub scaling_rules: ScalingRulesConfig,
    pub plan_check: Option<PlanCheckConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Where bound apps send custom metrics; echoed in binding credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsForwarderConfig {
    pub url: String,
    #[serde(default)]
    pub mtls_url: Option<String>,
}

/// An inclusive threshold window for a resource metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRange {
    pub lower_threshold: i64,
    pub upper_threshold: i64,
}

impl ThresholdRange {
    pub const fn new(lower_threshold: i64, upper_threshold: i64) -> Self {
        Self {
            lower_threshold,
            upper_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingRulesConfig {
    #[serde(default = "default_percent_range")]
    pub cpu: ThresholdRange,
    #[serde(default = "default_percent_range")]
    pub cpuutil: ThresholdRange,
    #[serde(default = "default_percent_range")]
    pub diskutil: ThresholdRange,
    #[serde(default = "default_disk_range")]
    pub disk: ThresholdRange,
}

impl Default for ScalingRulesConfig {
    fn default() -> Self {
        Self {
            cpu: default_percent_range(),
            cpuutil: default_percent_range(),
            diskutil: default_percent_range(),
            disk: default_disk_range(),
        }
    }
}

/// Per-plan limits, keyed by plan id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanCheckConfig {
    #[serde(default)]
    pub plan_definitions: HashMap<String, PlanDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDefinition {
    #[serde(default)]
    pub plan_check_enabled: bool,
    #[serde(default)]
    pub schedules_count: usize,
    #[serde(default)]
    pub scaling_rules_count: usize,
    #[serde(default)]
    pub plan_updateable: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/autoscaler")
}

fn default_cred_helper() -> String {
    DEFAULT_CRED_HELPER.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_percent_range() -> ThresholdRange {
    ThresholdRange::new(1, 100)
}

fn default_disk_range() -> ThresholdRange {
    ThresholdRange::new(1, 2048)
}

impl BrokerConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "broker config read");
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: BrokerConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.scheduler.url.is_empty() {
            return Err(ConfigError::Invalid("scheduler.url is empty".into()));
        }
        if self.metrics_forwarder.url.is_empty() {
            return Err(ConfigError::Invalid("metrics_forwarder.url is empty".into()));
        }
        if self.cred_helper_impl != DEFAULT_CRED_HELPER {
            return Err(ConfigError::Invalid(format!(
                "unsupported cred_helper_impl {:?}",
                self.cred_helper_impl
            )));
        }
        let rules = &self.scaling_rules;
        for (name, range) in [
            ("cpu", rules.cpu),
            ("cpuutil", rules.cpuutil),
            ("diskutil", rules.diskutil),
            ("disk", rules.disk),
        ] {
            if range.lower_threshold < 0 {
                return Err(ConfigError::Invalid(format!(
                    "scaling_rules.{name}.lower_threshold is negative"
                )));
            }
            if range.upper_threshold < 0 {
                return Err(ConfigError::Invalid(format!(
                    "scaling_rules.{name}.upper_threshold is negative"
                )));
            }
            if range.lower_threshold > range.upper_threshold {
                return Err(ConfigError::Invalid(format!(
                    "scaling_rules.{name}.lower_threshold is above upper_threshold"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
catalog_path = "catalog.json"

[scheduler]
url = "https://scheduler.internal"

[metrics_forwarder]
url = "https://metrics.example.com"
"#;

    #[test]
    fn test_parse_minimal() {
        let config = BrokerConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scheduler.timeout_secs, 30);
        assert_eq!(config.default_credential_type, CredentialType::BindingSecret);
        assert_eq!(config.scaling_rules.disk, ThresholdRange::new(1, 2048));
        assert!(config.plan_check.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_plan_definitions() {
        let toml_str = format!(
            "{MINIMAL}
[plan_check.plan_definitions.small]
plan_check_enabled = true
schedules_count = 2
scaling_rules_count = 4
plan_updateable = true
"
        );
        let config = BrokerConfig::from_toml(&toml_str).unwrap();
        let plans = config.plan_check.unwrap().plan_definitions;
        assert_eq!(
            plans["small"],
            PlanDefinition {
                plan_check_enabled: true,
                schedules_count: 2,
                scaling_rules_count: 4,
                plan_updateable: true,
            }
        );
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let toml_str = format!(
            "{MINIMAL}
[scaling_rules.cpu]
lower_threshold = 80
upper_threshold = 20
"
        );
        let config = BrokerConfig::from_toml(&toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scaling_rules.cpu"));
    }

    #[test]
    fn test_validate_rejects_unknown_cred_helper() {
        let toml_str = format!("cred_helper_impl = \"plugin\"\n{MINIMAL}");
        let config = BrokerConfig::from_toml(&toml_str).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let err = BrokerConfig::from_file(Path::new("/nonexistent/broker.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
