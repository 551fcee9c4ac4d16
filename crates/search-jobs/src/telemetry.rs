//! Tracing setup for services embedding the engine.
//!
//! [`init_tracing`] installs the global subscriber: an `EnvFilter` read from
//! `SEARCH_LOG` (falling back to `RUST_LOG`, then to a given level) and a
//! text or JSON formatter. Only the first successful call in a process has
//! any effect.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the engine's log filter.
pub const LOG_ENV: &str = "SEARCH_LOG";

/// Set to `json` to emit newline-delimited JSON.
pub const LOG_FORMAT_ENV: &str = "SEARCH_LOG_FORMAT";

/// How log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else, or nothing, is text.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    /// The format named by `SEARCH_LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber. Returns `false` if one was already set,
/// in which case nothing changes.
pub fn init_tracing(format: LogFormat, level: Level) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(level));
    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().with_target(false).json())
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init(),
    };
    installed.is_ok()
}

/// [`init_tracing`] with the format taken from `SEARCH_LOG_FORMAT`.
pub fn init_tracing_from_env(level: Level) -> bool {
    init_tracing(LogFormat::from_env(), level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("text")), LogFormat::Text);
        assert_eq!(LogFormat::parse(Some("yaml")), LogFormat::Text);
        assert_eq!(LogFormat::parse(None), LogFormat::Text);
    }

    #[test]
    fn test_log_format_from_env_selects_json() {
        std::env::set_var(LOG_FORMAT_ENV, "json");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);
        std::env::remove_var(LOG_FORMAT_ENV);
        assert_eq!(LogFormat::from_env(), LogFormat::Text);
    }
}
