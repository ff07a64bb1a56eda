use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Runtime;
use tracing::warn;

use super::{AddressCheck, AddressProvider, ProviderError};
use crate::config::FiasConfig;

const DEFAULT_API_URL: &str = "https://suggestions.dadata.ru/suggestions/api/4_1/rs";
const SUGGEST_ADDRESS_PATH: &str = "/suggest/address";

/// Address validation via the DaData suggestions API.
///
/// Wraps the async HTTP client and a dedicated runtime so the synchronous
/// rule evaluator can call it without exposing async details. The rule
/// passes when the `suggestions` array in the response is non-empty; a
/// missing API key, 403 (bad key or daily quota), 429 (rate limit),
/// timeout, or malformed response all surface as `Unavailable`.
pub struct DaDataProvider {
    client: reqwest::Client,
    runtime: Runtime,
    api_key: Option<String>,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(default)]
    value: String,
}

impl DaDataProvider {
    pub fn from_config(config: &FiasConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ProviderError::Runtime(err.to_string()))?;
        let runtime = Runtime::new().map_err(|err| ProviderError::Runtime(err.to_string()))?;

        Ok(Self {
            client,
            runtime,
            api_key: config.api_key.clone(),
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }

    fn suggest_url(&self) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), SUGGEST_ADDRESS_PATH)
    }
}

impl AddressProvider for DaDataProvider {
    fn name(&self) -> &'static str {
        "dadata"
    }

    fn check(&self, address: &str) -> AddressCheck {
        let api_key = match &self.api_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => {
                warn!("DaData API key is not configured, skipping FIAS check");
                return AddressCheck::Unavailable {
                    reason: "DADATA_API_KEY is not configured".to_string(),
                };
            }
        };

        let url = self.suggest_url();
        let payload = json!({ "query": address, "count": 1 });

        let response = self.runtime.block_on(async {
            self.client
                .post(&url)
                .header("Authorization", format!("Token {api_key}"))
                .json(&payload)
                .send()
                .await
        });

        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                warn!("DaData request timed out");
                return AddressCheck::Unavailable {
                    reason: "request timed out".to_string(),
                };
            }
            Err(err) => {
                warn!(error = %err, "DaData request failed");
                return AddressCheck::Unavailable {
                    reason: format!("request failed: {err}"),
                };
            }
        };

        match response.status().as_u16() {
            403 => {
                warn!("DaData returned 403: invalid key or daily quota exceeded");
                return AddressCheck::Unavailable {
                    reason: "authorization rejected (403)".to_string(),
                };
            }
            429 => {
                warn!("DaData rate limit hit (429)");
                return AddressCheck::Unavailable {
                    reason: "rate limit exceeded (429)".to_string(),
                };
            }
            status if !(200..300).contains(&status) => {
                warn!(status, "DaData returned unexpected status");
                return AddressCheck::Unavailable {
                    reason: format!("unexpected status {status}"),
                };
            }
            _ => {}
        }

        let parsed = self
            .runtime
            .block_on(async { response.json::<SuggestResponse>().await });

        match parsed {
            Ok(body) if body.suggestions.is_empty() => AddressCheck::NotFound,
            Ok(body) => AddressCheck::Found {
                matched: body
                    .suggestions
                    .into_iter()
                    .next()
                    .map(|suggestion| suggestion.value),
            },
            Err(err) => {
                warn!(error = %err, "failed to parse DaData response");
                AddressCheck::Unavailable {
                    reason: format!("malformed response: {err}"),
                }
            }
        }
    }
}

impl std::fmt::Debug for DaDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaDataProvider")
            .field("api_url", &self.api_url)
            .field("api_key_present", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}
