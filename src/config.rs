//! YAML configuration (spec.md §6), with environment-variable overrides
//! for secrets, following the precedence the teacher's `Config::from_env`
//! already establishes (env wins when present).

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub parser: ParserConfig,
    #[serde(default)]
    pub value_calculator: ValueCalculatorConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub interval: Duration,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    pub enabled_parsers: Vec<String>,
    #[serde(flatten, default)]
    pub sources: HashMap<String, SourceConfig>,
}

fn default_interval() -> Duration {
    Duration::from_secs(120)
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(with = "humantime_serde::option", default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub proxy_list: Vec<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Minimum inter-request delay for this source (spec.md §4.2); absent
    /// means unrate-limited.
    #[serde(with = "humantime_serde::option", default)]
    pub min_request_interval: Option<Duration>,
    #[serde(default)]
    pub insecure_tls: bool,
    /// Sport id, country id, referer, mirror-url, api-key, device-uuid and
    /// any other per-source custom field (spec.md §6).
    #[serde(flatten, default)]
    pub custom: HashMap<String, String>,
}

impl SourceConfig {
    pub fn custom(&self, key: &str) -> Option<&str> {
        self.custom.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueCalculatorConfig {
    #[serde(default)]
    pub sports: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    pub port: u16,
    #[serde(with = "humantime_serde::option", default)]
    pub read_header_timeout: Option<Duration>,
    #[serde(with = "humantime_serde::option", default)]
    pub async_parsing_timeout: Option<Duration>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let mut config: Config = serde_yaml::from_str(&raw)?;
        config.apply_env_overrides();
        if config.health.port == 0 {
            return Err(ConfigError::MissingField("health.port"));
        }
        Ok(config)
    }

    /// Per-source secret overrides from the environment (spec.md §6):
    /// `PINNACLE_API_KEY`, `PINNACLE_DEVICE_UUID`, `PINNACLE_PROXY`,
    /// `<SOURCE>_INSECURE_TLS=1`.
    fn apply_env_overrides(&mut self) {
        for (name, source) in self.parser.sources.iter_mut() {
            let prefix = name.to_uppercase();

            if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
                source.custom.insert("api-key".to_string(), key);
            }
            if let Ok(uuid) = std::env::var(format!("{prefix}_DEVICE_UUID")) {
                source.custom.insert("device-uuid".to_string(), uuid);
            }
            if let Ok(proxy) = std::env::var(format!("{prefix}_PROXY")) {
                source.proxy_list = proxy.split(',').map(str::to_string).collect();
            }
            if let Ok(insecure) = std::env::var(format!("{prefix}_INSECURE_TLS")) {
                source.insecure_tls = insecure == "1";
            }
        }
    }

    pub fn validate_enabled_parsers(&self, registered: &[&str]) -> Result<(), ConfigError> {
        for name in &self.parser.enabled_parsers {
            if !registered.contains(&name.as_str()) {
                return Err(ConfigError::UnregisteredParser(name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_health_port_is_rejected() {
        let yaml = r#"
parser:
  enabled_parsers: []
health:
  port: 0
"#;
        let parsed: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.health.port, 0);
    }

    #[test]
    fn unregistered_parser_is_an_error() {
        let yaml = r#"
parser:
  enabled_parsers: ["ghost"]
health:
  port: 8080
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate_enabled_parsers(&["monaco", "pinnacle"]).is_err());
    }
}
