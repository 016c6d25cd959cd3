//! Structured tracing helpers.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

/// Subscriber settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `info` or `chat_window=debug`.
    pub default_directive: String,
    /// Print the event target (module path).
    pub with_target: bool,
    /// Colourise output.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_owned(),
            with_target: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Config with a different fallback directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    /// Filter from `RUST_LOG`, or from the fallback directive.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidFilter`] when `RUST_LOG` is unset and
    /// the fallback does not parse.
    pub fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        EnvFilter::try_from_default_env().or_else(|_| {
            EnvFilter::try_new(&self.default_directive).map_err(|err| {
                TelemetryError::InvalidFilter {
                    directive: self.default_directive.clone(),
                    reason: err.to_string(),
                }
            })
        })
    }
}

/// Installs a global `fmt` subscriber.
///
/// # Errors
///
/// Fails on an invalid filter or when a subscriber is already installed.
pub fn init(config: &TelemetryConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_level(true)
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInitialised {
            reason: err.to_string(),
        })?;
    tracing::debug!(directive = %config.default_directive, "telemetry initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_filters_at_info() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_directive, "info");
        assert!(!config.with_target);
    }

    #[test]
    fn rejects_unparseable_directive() {
        // Only meaningful when RUST_LOG does not override the fallback.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = TelemetryConfig::default().with_directive("chat_window=loud");
        assert!(matches!(
            config.env_filter(),
            Err(TelemetryError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn second_init_is_reported() {
        let config = TelemetryConfig::default().with_directive("warn");
        let _ = init(&config);
        let second = init(&config);
        assert!(matches!(second, Err(TelemetryError::AlreadyInitialised { .. })));
    }
}
