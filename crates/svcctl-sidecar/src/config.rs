//! Sidecar configuration
//!
//! Layered with the `config` crate: built-in defaults, then the TOML file
//! named by `SVCCTL_CONFIG` (default `svcctl.toml`, skipped when absent),
//! then `SVCCTL__SECTION__KEY` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use svcctl_common::MetricKind;
use svcctl_control::check::options::{
    CheckOptions, DEFAULT_EXPIRATION, DEFAULT_FLUSH_INTERVAL, DEFAULT_NUM_ENTRIES,
};

const DEFAULT_CONFIG_FILE: &str = "svcctl.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    /// Name of the protected service
    pub service_name: String,
    #[serde(default)]
    pub check: CheckSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    /// Merge kind per metric name; unlisted metrics are DELTA
    #[serde(default)]
    pub metric_kinds: HashMap<String, MetricKind>,
}

/// Check-decision cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    /// `<= 0` disables caching
    pub num_entries: i64,
    /// Omit to disable time-based resends
    pub flush_interval_ms: Option<u64>,
    pub expiration_ms: u64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            num_entries: DEFAULT_NUM_ENTRIES,
            flush_interval_ms: Some(DEFAULT_FLUSH_INTERVAL.as_millis() as u64),
            expiration_ms: DEFAULT_EXPIRATION.as_millis() as u64,
        }
    }
}

impl CheckSettings {
    pub fn to_options(&self) -> CheckOptions {
        CheckOptions::new(
            self.num_entries,
            self.flush_interval_ms.map(Duration::from_millis),
            Duration::from_millis(self.expiration_ms),
        )
    }
}

/// Token authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Issuer -> provider id
    pub issuers: HashMap<String, String>,
    /// Issuer -> JWKS file
    pub jwks: HashMap<String, PathBuf>,
    pub token_cache_capacity: usize,
    pub token_cache_ttl_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            issuers: HashMap::new(),
            jwks: HashMap::new(),
            token_cache_capacity: svcctl_auth::authenticator::DEFAULT_CACHE_CAPACITY,
            token_cache_ttl_secs: svcctl_auth::authenticator::DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

impl AuthSettings {
    pub fn token_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.token_cache_ttl_secs)
    }
}

impl SidecarConfig {
    /// Load from defaults, the config file and the environment
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("SVCCTL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = Config::builder();
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::from(Path::new(&config_file)));
        }
        builder = builder.add_source(
            Environment::with_prefix("SVCCTL")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")
    }

    /// Parse a TOML document on its own
    pub fn from_toml(document: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = SidecarConfig::from_toml(r#"service_name = "svcA""#).unwrap();

        assert_eq!(config.service_name, "svcA");
        assert_eq!(config.check.to_options(), CheckOptions::default());
        assert_eq!(config.auth.token_cache_capacity, 200);
        assert_eq!(config.auth.token_cache_ttl(), Duration::from_secs(300));
        assert!(config.metric_kinds.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = SidecarConfig::from_toml(
            r#"
            service_name = "library.example.com"

            [check]
            num_entries = 0
            expiration_ms = 100
            flush_interval_ms = 1000

            [auth]
            token_cache_capacity = 10
            token_cache_ttl_secs = 60

            [auth.issuers]
            "https://issuer.example.com" = "example-provider"

            [auth.jwks]
            "https://issuer.example.com" = "/etc/svcctl/example.jwks"

            [metric_kinds]
            "library.example.com/books/on_loan" = "GAUGE"
            "#,
        )
        .unwrap();

        let options = config.check.to_options();
        assert!(!options.caching_enabled());
        assert_eq!(options.expiration, Duration::from_millis(1001));
        assert_eq!(
            config.auth.issuers.get("https://issuer.example.com").map(String::as_str),
            Some("example-provider")
        );
        assert_eq!(
            config.auth.jwks.get("https://issuer.example.com"),
            Some(&PathBuf::from("/etc/svcctl/example.jwks"))
        );
        assert_eq!(
            config.metric_kinds.get("library.example.com/books/on_loan"),
            Some(&MetricKind::Gauge)
        );
    }

    #[test]
    fn test_missing_service_name_is_an_error() {
        assert!(SidecarConfig::from_toml("[check]\nnum_entries = 5").is_err());
    }

    #[test]
    fn test_unknown_metric_kind_is_an_error() {
        let document = "service_name = \"s\"\n[metric_kinds]\nm = \"SOMETIMES\"";
        assert!(SidecarConfig::from_toml(document).is_err());
    }
}
