//! Engine configuration.
//!
//! Defaults can be overridden from environment variables ([`EngineConfig::from_env`])
//! or from a JSON document ([`EngineConfig::from_json`]); missing JSON fields
//! keep their defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use search_protocol::Protocol;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid engine config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout when the query sets none.
    pub default_timeout_secs: u64,
    /// Upper bound on any requested timeout (exhaustive searches excepted).
    pub max_timeout_secs: u64,
    pub exhaustive_timeout_secs: u64,
    /// Grace window of Priority jobs.
    pub priority_grace_ms: u64,
    /// Simultaneously running children of one And/Or job.
    pub max_concurrency: usize,
    /// Result cap of each operand of an And expression.
    pub and_operand_limit: usize,
    pub default_limit_streaming: usize,
    pub default_limit_batch: usize,
    pub default_limit_exhaustive: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 20,
            max_timeout_secs: 60,
            exhaustive_timeout_secs: 60 * 60,
            priority_grace_ms: 100,
            max_concurrency: crate::combinators::DEFAULT_MAX_CONCURRENCY,
            and_operand_limit: 40_000,
            default_limit_streaming: 500,
            default_limit_batch: 30,
            default_limit_exhaustive: 1_000_000,
        }
    }
}

fn env_override<T: std::str::FromStr>(var: &'static str, target: &mut T) -> Result<()> {
    if let Ok(value) = std::env::var(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value })?;
    }
    Ok(())
}

impl EngineConfig {
    /// Defaults overridden by environment variables.
    ///
    /// Reads:
    /// - SEARCH_DEFAULT_TIMEOUT_SECS
    /// - SEARCH_MAX_TIMEOUT_SECS
    /// - SEARCH_EXHAUSTIVE_TIMEOUT_SECS
    /// - SEARCH_PRIORITY_GRACE_MS
    /// - SEARCH_MAX_CONCURRENCY
    /// - SEARCH_AND_OPERAND_LIMIT
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        env_override("SEARCH_DEFAULT_TIMEOUT_SECS", &mut config.default_timeout_secs)?;
        env_override("SEARCH_MAX_TIMEOUT_SECS", &mut config.max_timeout_secs)?;
        env_override(
            "SEARCH_EXHAUSTIVE_TIMEOUT_SECS",
            &mut config.exhaustive_timeout_secs,
        )?;
        env_override("SEARCH_PRIORITY_GRACE_MS", &mut config.priority_grace_ms)?;
        env_override("SEARCH_MAX_CONCURRENCY", &mut config.max_concurrency)?;
        env_override("SEARCH_AND_OPERAND_LIMIT", &mut config.and_operand_limit)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_timeout_secs)
    }

    pub fn exhaustive_timeout(&self) -> Duration {
        Duration::from_secs(self.exhaustive_timeout_secs)
    }

    pub fn priority_grace(&self) -> Duration {
        Duration::from_millis(self.priority_grace_ms)
    }

    /// The timeout a query runs under.
    ///
    /// Exhaustive searches use the requested timeout or the exhaustive
    /// default, uncapped. Otherwise the requested timeout is used, or the
    /// maximum when only a result count was requested, or the default; the
    /// result never exceeds the maximum.
    pub fn timeout_for(
        &self,
        protocol: Protocol,
        requested: Option<Duration>,
        count_set: bool,
    ) -> Duration {
        if protocol == Protocol::Exhaustive {
            return requested.unwrap_or_else(|| self.exhaustive_timeout());
        }
        let timeout = match requested {
            Some(requested) => requested,
            None if count_set => self.max_timeout(),
            None => self.default_timeout(),
        };
        timeout.min(self.max_timeout())
    }

    /// Result limit when the query sets no `count:`.
    pub fn default_limit(&self, protocol: Protocol) -> usize {
        match protocol {
            Protocol::Streaming => self.default_limit_streaming,
            Protocol::Batch => self.default_limit_batch,
            Protocol::Exhaustive => self.default_limit_exhaustive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults_and_cap() {
        let config = EngineConfig::default();
        assert_eq!(
            config.timeout_for(Protocol::Streaming, None, false),
            Duration::from_secs(20)
        );
        assert_eq!(
            config.timeout_for(Protocol::Streaming, None, true),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.timeout_for(Protocol::Batch, Some(Duration::from_secs(600)), false),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.timeout_for(Protocol::Batch, Some(Duration::from_secs(5)), true),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_exhaustive_timeout_is_uncapped() {
        let config = EngineConfig::default();
        assert_eq!(
            config.timeout_for(Protocol::Exhaustive, None, false),
            Duration::from_secs(3600)
        );
        assert_eq!(
            config.timeout_for(Protocol::Exhaustive, Some(Duration::from_secs(7200)), false),
            Duration::from_secs(7200)
        );
    }

    #[test]
    fn test_default_limit_by_protocol() {
        let config = EngineConfig::default();
        assert_eq!(config.default_limit(Protocol::Streaming), 500);
        assert_eq!(config.default_limit(Protocol::Batch), 30);
    }

    #[test]
    fn test_from_json_keeps_missing_defaults() {
        let config = EngineConfig::from_json(r#"{"max_concurrency": 4}"#).unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.priority_grace(), Duration::from_millis(100));
    }

    #[test]
    fn test_from_json_rejects_zero_concurrency() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"max_concurrency": 0}"#),
            Err(ConfigError::ZeroConcurrency)
        ));
        assert!(matches!(
            EngineConfig::from_json("{"),
            Err(ConfigError::Json(_))
        ));
    }
}
