use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://api.mistral.ai";
pub const DEFAULT_MODEL: &str = "mistral-tiny";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Origin serving the backend `config.json`
    pub backend_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            backend_origin: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Self::get_config_path()?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Like `load`, but a missing or broken file is logged and replaced
    /// by the defaults
    pub fn load_or_default() -> Self {
        match Self::get_config_path() {
            Ok(path) => Self::load_or_default_from(path),
            Err(e) => {
                warn!(error = %e, "no config directory, using default settings");
                Self::default()
            }
        }
    }

    pub fn load_or_default_from(path: impl AsRef<Path>) -> Self {
        Self::load_from(path).unwrap_or_else(|e| {
            warn!(error = %format!("{:#}", e), "ignoring unreadable config file, using default settings");
            Self::default()
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Self::get_config_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply `ETHIX_API_BASE` / `ETHIX_MODEL` on top of the file values
    pub fn with_env(mut self) -> Self {
        if let Some(base) = env_non_empty("ETHIX_API_BASE") {
            self.api_base = base;
        }
        if let Some(model) = env_non_empty("ETHIX_MODEL") {
            self.model = model;
        }
        self
    }

    /// Key used when no override is saved: `MISTRAL_API_KEY` at runtime,
    /// then whatever was baked in at build time.
    pub fn default_api_key() -> String {
        env_non_empty("MISTRAL_API_KEY")
            .or_else(|| option_env!("ETHIX_DEFAULT_API_KEY").map(str::to_string))
            .unwrap_or_default()
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ethix"))
    }

    /// File backing the key-value storage (saved API key)
    pub fn storage_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("storage.json"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("ethix.log"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
