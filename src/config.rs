//! Runtime configuration.
//!
//! Defaults suit local use; any field can be overridden from the environment
//! with the `QUOTE_` prefix.
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::warn;

const ENV_PREFIX: &str = "QUOTE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the sled database lives
    pub db_path: PathBuf,
    /// Prefix for generated artifact URLs
    pub artifact_base_url: String,
    /// bech32 human readable part for document hashes
    pub hash_prefix: String,
    pub otp_digits: u32,
    /// Days until a new document expires
    pub expiry_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("quote-documents.db"),
            artifact_base_url: "https://files.localhost/quotes".into(),
            hash_prefix: "doc_".into(),
            otp_digits: 6,
            expiry_days: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults for
    /// anything missing or unparsable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(path) = var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(url) = var("ARTIFACT_BASE_URL") {
            config.artifact_base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(prefix) = var("HASH_PREFIX") {
            config.hash_prefix = prefix;
        }
        if let Some(raw) = var("OTP_DIGITS") {
            match raw.parse::<u32>() {
                Ok(digits) if (4..=9).contains(&digits) => config.otp_digits = digits,
                _ => warn!(value = %raw, "ignoring QUOTE_OTP_DIGITS, expected 4 to 9"),
            }
        }
        if let Some(raw) = var("EXPIRY_DAYS") {
            match raw.parse::<i64>() {
                Ok(days) if days > 0 => config.expiry_days = days,
                _ => warn!(value = %raw, "ignoring QUOTE_EXPIRY_DAYS, expected a positive number"),
            }
        }

        config
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_come_from_prefixed_keys() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("QUOTE_DB_PATH", "/tmp/quotes.db"),
            ("QUOTE_ARTIFACT_BASE_URL", "https://cdn.example.com/pdf/"),
            ("QUOTE_OTP_DIGITS", "8"),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/tmp/quotes.db"));
        assert_eq!(config.artifact_base_url, "https://cdn.example.com/pdf");
        assert_eq!(config.otp_digits, 8);
        assert_eq!(config.expiry_days, 30);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("QUOTE_OTP_DIGITS", "20"), ("QUOTE_EXPIRY_DAYS", "soon")]);
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config, Config::default());
    }
}
