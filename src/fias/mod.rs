//! Pluggable address-existence lookup used by the `fias_check` rule kind.
//!
//! Providers are selected by name through an explicit [`ProviderRegistry`]
//! built once at startup and passed into the engine, so swapping the backend
//! never touches rule-evaluation code. Every transport, authentication, or
//! quota failure resolves to [`AddressCheck::Unavailable`]; the evaluator
//! treats that as a pass (fail-open), because a third-party outage must not
//! block ticket submission. Only an explicit empty suggestion list is a
//! genuine validation failure.

mod dadata;

pub use dadata::DaDataProvider;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::FiasConfig;

/// Outcome of one address lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressCheck {
    /// The backend returned at least one suggestion.
    Found { matched: Option<String> },
    /// The backend answered with zero suggestions.
    NotFound,
    /// The backend could not be consulted; callers fail open.
    Unavailable { reason: String },
}

/// Synchronous address validation boundary.
pub trait AddressProvider: Send + Sync {
    fn name(&self) -> &'static str;
    /// Look up `address`; never returns an error. Transport problems are
    /// reported as [`AddressCheck::Unavailable`].
    fn check(&self, address: &str) -> AddressCheck;
}

/// Error raised while building or selecting a provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unknown FIAS provider '{0}'")]
    Unknown(String),
    #[error("provider runtime unavailable: {0}")]
    Runtime(String),
}

/// Registry mapping provider names to instances.
///
/// Constructed once at startup from configuration; lookups return shared
/// handles so the engine holds no hidden global state.
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn AddressProvider>>,
}

impl ProviderRegistry {
    /// Build the registry with every built-in provider.
    pub fn from_config(config: &FiasConfig) -> Result<Self, ProviderError> {
        let mut registry = Self {
            providers: BTreeMap::new(),
        };
        registry.register(Arc::new(DaDataProvider::from_config(config)?));
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn AddressProvider>) {
        self.providers
            .insert(provider.name().to_lowercase(), provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn AddressProvider>, ProviderError> {
        self.providers
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| ProviderError::Unknown(name.to_string()))
    }

    /// Provider selected by the configuration, defaulting to `dadata`.
    pub fn select(&self, config: &FiasConfig) -> Result<Arc<dyn AddressProvider>, ProviderError> {
        self.get(&config.provider)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
