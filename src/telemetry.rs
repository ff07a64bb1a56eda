//! Tracing setup for the ticket validation service.
//!
//! Rule evaluation logs misconfigured patterns and fail-open address checks
//! at `warn`, so the default filter keeps those visible while silencing the
//! HTTP client chatter from the address-lookup provider.

use crate::config::{AppConfig, AppEnvironment};
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Directives appended to the configured level so address lookups do not
/// flood batch runs with per-request client logs.
const HTTP_CLIENT_DIRECTIVES: &str = "hyper=warn,reqwest=warn";

#[derive(Debug)]
pub enum TelemetryError {
    Filter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { value, .. } => {
                write!(f, "invalid log filter '{}'", value)
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

fn build_filter(log_level: &str) -> Result<EnvFilter, TelemetryError> {
    let spec = format!("{log_level},{HTTP_CLIENT_DIRECTIVES}");
    EnvFilter::try_new(&spec).map_err(|source| TelemetryError::Filter { value: spec, source })
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level
/// when set; event targets are shown only in development.
pub fn init(config: &AppConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.telemetry.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.environment == AppEnvironment::Development)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_combines_with_client_directives() {
        assert!(build_filter("debug").is_ok());
    }

    #[test]
    fn malformed_level_is_reported_with_the_full_spec() {
        let err = build_filter("not a [filter").expect_err("filter must be rejected");
        assert!(matches!(
            err,
            TelemetryError::Filter { ref value, .. } if value.starts_with("not a [filter,")
        ));
    }
}
