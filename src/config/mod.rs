use std::env;
use std::fmt;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub fias: FiasConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            fias: FiasConfig::load()?,
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

const DEFAULT_FIAS_TIMEOUT_SECS: u64 = 10;

/// Settings for the external address-lookup provider.
///
/// A missing API key is not a startup error: the provider reports itself
/// unavailable at lookup time and the `fias_check` rule fails open.
#[derive(Debug, Clone)]
pub struct FiasConfig {
    /// Provider selection name, e.g. `dadata`.
    pub provider: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout: Duration,
}

impl FiasConfig {
    fn load() -> Result<Self, ConfigError> {
        let provider = env::var("FIAS_PROVIDER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "dadata".to_string());

        let api_key = env::var("DADATA_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let api_url = env::var("DADATA_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let timeout_secs = match env::var("FIAS_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout { value: raw })?,
            Err(_) => DEFAULT_FIAS_TIMEOUT_SECS,
        };

        Ok(Self {
            provider,
            api_key,
            api_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for FiasConfig {
    fn default() -> Self {
        Self {
            provider: "dadata".to_string(),
            api_key: None,
            api_url: None,
            timeout: Duration::from_secs(DEFAULT_FIAS_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidTimeout { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTimeout { value } => {
                write!(f, "FIAS_TIMEOUT_SECS must be a whole number of seconds, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
