//! Configuration types for the tunnel adapter

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::path::Platform;

/// Longest accepted settings acknowledgement timeout
const MAX_SETTINGS_TIMEOUT_MS: u64 = 60_000;

/// Main configuration structure
///
/// The configuration file uses TOML format.
///
/// # Example Configuration
///
/// ```toml
/// [common]
/// log_level = "info"
///
/// [portal]
/// url = "wss://api.example.com"
/// token = "your-token"
///
/// [adapter]
/// platform = "mobile"        # optional, defaults to the host
/// settings_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Settings shared by every component
    #[serde(default)]
    pub common: CommonConfig,

    /// Where the engine connects to
    pub portal: PortalConfig,

    /// Adapter tuning
    #[serde(default)]
    pub adapter: AdapterConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.portal.validate()?;
        self.adapter.validate()?;
        Ok(())
    }

    /// Generate a sample configuration
    pub fn sample() -> String {
        r#"# Rugate Tunnel Configuration

[common]
# Log level: "error", "warn", "info", "debug", "trace"
log_level = "info"

[portal]
# Portal the tunnel engine connects to (http, https, ws or wss)
url = "wss://api.example.com"

# Authentication token issued by the portal (required)
token = "your-token-here"

[adapter]
# Reconnection policy: "desktop" or "mobile"
# If not set, chosen from the host operating system.
# platform = "desktop"

# How long to wait for the OS to acknowledge tunnel settings, in milliseconds.
# A missing acknowledgement after this long is treated as success.
settings_timeout_ms = 5000
"#
        .to_string()
    }
}

/// Settings shared by every component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Log level (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Portal connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal URL
    pub url: String,

    /// Authentication token
    pub token: String,
}

impl PortalConfig {
    /// Validate portal configuration
    pub fn validate(&self) -> Result<()> {
        let scheme = self
            .url
            .split_once("://")
            .map(|(scheme, rest)| (scheme, rest.is_empty()));
        match scheme {
            Some(("http" | "https" | "ws" | "wss", false)) => {}
            _ => {
                return Err(Error::Config(format!(
                    "portal url `{}` must be an http(s) or ws(s) URL",
                    self.url
                )))
            }
        }

        if self.token.trim().is_empty() {
            return Err(Error::Config("portal token is required".into()));
        }

        Ok(())
    }
}

/// Adapter tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Platform class; `None` selects the host's
    #[serde(default)]
    pub platform: Option<Platform>,

    /// Settings acknowledgement timeout in milliseconds (default: 5000)
    #[serde(default = "default_settings_timeout_ms")]
    pub settings_timeout_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            platform: None,
            settings_timeout_ms: default_settings_timeout_ms(),
        }
    }
}

impl AdapterConfig {
    /// Validate adapter configuration
    pub fn validate(&self) -> Result<()> {
        if self.settings_timeout_ms == 0 || self.settings_timeout_ms > MAX_SETTINGS_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "settings_timeout_ms {} is out of range (1-{})",
                self.settings_timeout_ms, MAX_SETTINGS_TIMEOUT_MS
            )));
        }
        Ok(())
    }

    /// Settings acknowledgement timeout
    pub fn settings_timeout(&self) -> Duration {
        Duration::from_millis(self.settings_timeout_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_settings_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[portal]
url = "wss://api.example.com"
token = "secret"
"#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.portal.url, "wss://api.example.com");
        assert_eq!(config.common.log_level, "info");
        assert_eq!(config.adapter.platform, None);
        assert_eq!(config.adapter.settings_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[common]
log_level = "debug"

[portal]
url = "https://portal.example.com"
token = "secret"

[adapter]
platform = "desktop"
settings_timeout_ms = 1500
"#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.common.log_level, "debug");
        assert_eq!(config.adapter.platform, Some(Platform::Desktop));
        assert_eq!(config.adapter.settings_timeout_ms, 1500);
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = Config::from_toml(&Config::sample()).unwrap();
        assert_eq!(config.portal.token, "your-token-here");
    }

    #[test]
    fn test_missing_portal_fails() {
        let result = Config::from_toml("[common]\nlog_level = \"info\"\n");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_bad_url_fails() {
        for url in ["api.example.com", "ftp://api.example.com", "wss://"] {
            let toml = format!("[portal]\nurl = \"{}\"\ntoken = \"secret\"\n", url);
            let err = Config::from_toml(&toml).unwrap_err();
            assert!(err.is_config_error(), "{} should be rejected", url);
        }
    }

    #[test]
    fn test_empty_token_fails() {
        let toml = "[portal]\nurl = \"wss://api.example.com\"\ntoken = \"  \"\n";
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_timeout_range() {
        let base = "[portal]\nurl = \"wss://api.example.com\"\ntoken = \"t\"\n[adapter]\n";
        assert!(Config::from_toml(&format!("{}settings_timeout_ms = 0\n", base)).is_err());
        assert!(Config::from_toml(&format!("{}settings_timeout_ms = 60001\n", base)).is_err());
        assert!(Config::from_toml(&format!("{}settings_timeout_ms = 60000\n", base)).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(Config::sample().as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.portal.url, "wss://api.example.com");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
