//! Static configuration for the separate backend service
//!
//! The chat flow never touches this. It describes where the backend lives
//! for the identity/actor integration, which is loaded from a same-origin
//! `config.json` and falls back to environment values when that fails.

use anyhow::{Result, anyhow};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub const DEFAULT_STORAGE_GATEWAY_URL: &str = "https://dev-blob.caffeine.ai";
pub const DEFAULT_BUCKET_NAME: &str = "default-bucket";

#[derive(Deserialize)]
struct JsonBackendConfig {
    backend_host: Option<String>,
    backend_canister_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_host: Option<String>,
    pub backend_canister_id: String,
    pub storage_gateway_url: String,
    pub bucket_name: String,
}

impl BackendConfig {
    /// Values used when `config.json` can't be loaded
    pub fn from_env() -> Self {
        Self {
            backend_host: None,
            backend_canister_id: env_or("CANISTER_ID_ETHIXIA_MISTRAL_CHATBOX_BACKEND", ""),
            storage_gateway_url: env_or("STORAGE_GATEWAY_URL", DEFAULT_STORAGE_GATEWAY_URL),
            bucket_name: env_or("BUCKET_NAME", DEFAULT_BUCKET_NAME),
        }
    }
}

/// Fetches `config.json` once and keeps the answer for the process lifetime
pub struct BackendConfigLoader {
    client: Client,
    origin: String,
    cache: OnceCell<BackendConfig>,
}

impl BackendConfigLoader {
    pub fn new(origin: &str) -> Self {
        Self {
            client: Client::new(),
            origin: origin.trim_end_matches('/').to_string(),
            cache: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> &BackendConfig {
        self.cache
            .get_or_init(|| async {
                match self.fetch().await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!(error = %e, "Failed to load backend config, using defaults");
                        BackendConfig::from_env()
                    }
                }
            })
            .await
    }

    async fn fetch(&self) -> Result<BackendConfig> {
        let url = format!("{}/config.json", self.origin);
        debug!(%url, "fetching backend config");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Failed to load config: {}", response.status()));
        }

        let json: JsonBackendConfig = response.json().await?;
        let defaults = BackendConfig::from_env();

        Ok(BackendConfig {
            backend_host: json.backend_host,
            backend_canister_id: json.backend_canister_id,
            ..defaults
        })
    }
}

/// Pull the human-readable part out of an agent rejection
/// (`Reject code: N ... Reject text: T`). Anything else is returned as is.
pub fn extract_agent_error_message(error: &str) -> String {
    static REJECT: OnceLock<Regex> = OnceLock::new();
    let re = REJECT.get_or_init(|| {
        Regex::new(r"(?s)Reject code: (\d+).*Reject text: (.*)").expect("valid reject pattern")
    });

    re.captures(error)
        .and_then(|caps| caps.get(2))
        .map(|text| text.as_str().trim().to_string())
        .unwrap_or_else(|| error.to_string())
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
