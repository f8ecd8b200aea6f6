//! Configuration loading and validation (spec.md §6, SPEC_FULL.md §4.11).
//!
//! A textual YAML document with exactly three sections:
//!
//! ```yaml
//! exchange:
//!   okx:
//!     apiKey: ...
//!     secret: ...
//!     password: ...
//!   gateio:
//!     apiKey: ...
//!     secret: ...
//! currency:
//!   - BTC/USDT
//!   - ETH/USDT
//! log:
//!   enabled: true
//!   path: logs/marketsync.log
//! ```

mod error;

pub use error::ConfigError;

use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

use crate::domain::CanonicalPair;

/// Recognized credential keys within one venue's `exchange` entry (spec.md §6).
pub const CREDENTIAL_KEYS: &[&str] = &["apiKey", "secret", "password"];

/// One venue's credential map, as loaded from the `exchange` section.
pub type ExchangeSettings = HashMap<String, String>;

/// `log` section: whether logging is enabled and where the file sink writes to.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub enabled: bool,
    pub path: Option<String>,
}

/// Root configuration document (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "exchange")]
    pub exchanges: HashMap<String, ExchangeSettings>,
    #[serde(rename = "currency")]
    pub currencies: Vec<String>,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Loads and validates a configuration document from `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;

        if config.currencies.is_empty() {
            return Err(ConfigError::NoCurrencies);
        }

        Ok(config)
    }

    /// Returns the configured canonical pairs.
    pub fn pairs(&self) -> Vec<CanonicalPair> {
        self.currencies.iter().map(CanonicalPair::from).collect()
    }

    /// Returns the credential map for `venue`, failing fatally if the
    /// `exchange` section has no entry for it (spec.md §6).
    pub fn exchange_settings(&self, venue: &str) -> Result<&ExchangeSettings, ConfigError> {
        self.exchanges
            .get(venue)
            .ok_or_else(|| ConfigError::MissingExchange(venue.to_string()))
    }

    /// Looks up one required credential within a venue's settings.
    pub fn credential<'a>(
        settings: &'a ExchangeSettings,
        venue: &str,
        key: &str,
    ) -> Result<&'a str, ConfigError> {
        settings
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                venue: venue.to_string(),
                credential: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_document() {
        let file = write_temp_config(
            r#"
exchange:
  okx:
    apiKey: key
    secret: secret
    password: pass
  gateio:
    apiKey: key2
    secret: secret2
currency:
  - BTC/USDT
  - ETH/USDT
log:
  enabled: true
  path: logs/marketsync.log
"#,
        );

        let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.currencies, vec!["BTC/USDT", "ETH/USDT"]);
        assert!(cfg.log.enabled);
        assert_eq!(cfg.log.path.as_deref(), Some("logs/marketsync.log"));
        assert_eq!(
            Config::credential(cfg.exchange_settings("okx").unwrap(), "okx", "apiKey").unwrap(),
            "key"
        );
    }

    #[test]
    fn missing_currency_is_fatal() {
        let file = write_temp_config(
            r#"
exchange:
  okx:
    apiKey: key
    secret: secret
    password: pass
currency: []
"#,
        );

        assert!(matches!(
            Config::load(file.path().to_str().unwrap()),
            Err(ConfigError::NoCurrencies)
        ));
    }

    #[test]
    fn missing_exchange_section_is_fatal() {
        let file = write_temp_config(
            r#"
exchange:
  okx:
    apiKey: key
    secret: secret
    password: pass
currency:
  - BTC/USDT
"#,
        );

        let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
        assert!(matches!(
            cfg.exchange_settings("gateio"),
            Err(ConfigError::MissingExchange(venue)) if venue == "gateio"
        ));
    }

    #[test]
    fn missing_credential_is_fatal() {
        let file = write_temp_config(
            r#"
exchange:
  okx:
    apiKey: key
currency:
  - BTC/USDT
"#,
        );

        let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
        let settings = cfg.exchange_settings("okx").unwrap();
        assert!(matches!(
            Config::credential(settings, "okx", "secret"),
            Err(ConfigError::MissingCredential { .. })
        ));
    }
}
