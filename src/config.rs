//! Ledger configuration.
//!
//! ```
//! use billing_kit::config::BillingConfig;
//!
//! let config = BillingConfig::default()
//!     .with_upcoming_window_days(14)
//!     .with_serial_prefix("CUST");
//! assert_eq!(config.upcoming_window_days, 14);
//! assert_eq!(config.history_limit, 50);
//! ```

use crate::error::{Error, Result};
use std::str::FromStr;

/// Tunables for listings, serial generation and read behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BillingConfig {
    /// Days ahead of today counted as "upcoming" on the dashboard.
    pub upcoming_window_days: u32,
    /// Maximum upcoming-due entries on the dashboard.
    pub upcoming_limit: usize,
    /// Default page size for one customer's payment history.
    pub history_limit: usize,
    /// Default page size for the global payment listing.
    pub payments_limit: usize,
    /// Prefix of auto-generated serial numbers.
    pub serial_prefix: String,
    /// How many auto-generated serials to try before giving up on conflicts.
    pub serial_attempts: u32,
    /// Apply the derivation to customers returned by reads (not persisted).
    pub derive_on_read: bool,
}

impl Default for BillingConfig {
    fn default() -> Self {
        BillingConfig {
            upcoming_window_days: 7,
            upcoming_limit: 20,
            history_limit: 50,
            payments_limit: 100,
            serial_prefix: "AUTO".to_string(),
            serial_attempts: 3,
            derive_on_read: false,
        }
    }
}

impl BillingConfig {
    pub fn with_upcoming_window_days(mut self, days: u32) -> Self {
        self.upcoming_window_days = days;
        self
    }

    pub fn with_upcoming_limit(mut self, limit: usize) -> Self {
        self.upcoming_limit = limit;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_payments_limit(mut self, limit: usize) -> Self {
        self.payments_limit = limit;
        self
    }

    pub fn with_serial_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.serial_prefix = prefix.into();
        self
    }

    pub fn with_serial_attempts(mut self, attempts: u32) -> Self {
        self.serial_attempts = attempts;
        self
    }

    pub fn with_derive_on_read(mut self, enabled: bool) -> Self {
        self.derive_on_read = enabled;
        self
    }

    /// Defaults overridden by `BILLING_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `BILLING_UPCOMING_WINDOW_DAYS` | `upcoming_window_days` |
    /// | `BILLING_UPCOMING_LIMIT` | `upcoming_limit` |
    /// | `BILLING_HISTORY_LIMIT` | `history_limit` |
    /// | `BILLING_PAYMENTS_LIMIT` | `payments_limit` |
    /// | `BILLING_SERIAL_PREFIX` | `serial_prefix` |
    /// | `BILLING_DERIVE_ON_READ` | `derive_on_read` |
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for a value that does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`BillingConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BillingConfig::default();

        if let Some(days) = parse_var(&lookup, "BILLING_UPCOMING_WINDOW_DAYS")? {
            config.upcoming_window_days = days;
        }
        if let Some(limit) = parse_var(&lookup, "BILLING_UPCOMING_LIMIT")? {
            config.upcoming_limit = limit;
        }
        if let Some(limit) = parse_var(&lookup, "BILLING_HISTORY_LIMIT")? {
            config.history_limit = limit;
        }
        if let Some(limit) = parse_var(&lookup, "BILLING_PAYMENTS_LIMIT")? {
            config.payments_limit = limit;
        }
        if let Some(prefix) = lookup("BILLING_SERIAL_PREFIX") {
            let prefix = prefix.trim();
            if prefix.is_empty() {
                return Err(Error::ConfigError(
                    "BILLING_SERIAL_PREFIX must not be blank".to_string(),
                ));
            }
            config.serial_prefix = prefix.to_string();
        }
        if let Some(raw) = lookup("BILLING_DERIVE_ON_READ") {
            config.derive_on_read = parse_flag(&raw).ok_or_else(|| {
                Error::ConfigError(format!("BILLING_DERIVE_ON_READ is not a flag: {:?}", raw))
            })?;
        }

        debug!("Billing config loaded: {:?}", config);
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::ConfigError(format!("{} is not a number: {:?}", name, raw))),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.upcoming_window_days, 7);
        assert_eq!(config.upcoming_limit, 20);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.payments_limit, 100);
        assert_eq!(config.serial_prefix, "AUTO");
        assert_eq!(config.serial_attempts, 3);
        assert!(!config.derive_on_read);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = BillingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BillingConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = BillingConfig::from_lookup(lookup(&[
            ("BILLING_UPCOMING_WINDOW_DAYS", "14"),
            ("BILLING_HISTORY_LIMIT", " 10 "),
            ("BILLING_SERIAL_PREFIX", "CUST"),
            ("BILLING_DERIVE_ON_READ", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.upcoming_window_days, 14);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.serial_prefix, "CUST");
        assert!(config.derive_on_read);
        assert_eq!(config.payments_limit, 100);
    }

    #[test]
    fn test_malformed_number_is_config_error() {
        let result = BillingConfig::from_lookup(lookup(&[("BILLING_UPCOMING_LIMIT", "many")]));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_malformed_flag_is_config_error() {
        let result = BillingConfig::from_lookup(lookup(&[("BILLING_DERIVE_ON_READ", "maybe")]));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_blank_prefix_rejected() {
        let result = BillingConfig::from_lookup(lookup(&[("BILLING_SERIAL_PREFIX", "  ")]));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
