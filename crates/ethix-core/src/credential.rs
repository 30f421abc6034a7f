//! API key selection: a stored override, or the built-in default

use anyhow::Result;
use tracing::info;

use crate::storage::KeyValueStore;

/// Storage key holding the override key
pub const API_KEY_STORAGE_KEY: &str = "mistral-api-key";

pub struct CredentialStore<S: KeyValueStore> {
    storage: S,
    default_key: String,
    override_key: Option<String>,
}

impl<S: KeyValueStore> CredentialStore<S> {
    /// Loads any saved override from `storage`.
    pub fn load(storage: S, default_key: impl Into<String>) -> Self {
        let override_key = storage
            .get(API_KEY_STORAGE_KEY)
            .filter(|key| !key.trim().is_empty());

        Self {
            storage,
            default_key: default_key.into(),
            override_key,
        }
    }

    /// The key requests should use right now.
    pub fn get(&self) -> &str {
        self.override_key.as_deref().unwrap_or(&self.default_key)
    }

    pub fn override_key(&self) -> Option<&str> {
        self.override_key.as_deref()
    }

    pub fn is_using_default(&self) -> bool {
        self.override_key.is_none()
    }

    /// An empty value drops the override and falls back to the default.
    pub fn set(&mut self, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            self.storage.remove(API_KEY_STORAGE_KEY)?;
            self.override_key = None;
            info!("API key override cleared, using default key");
        } else {
            self.storage.set(API_KEY_STORAGE_KEY, value)?;
            self.override_key = Some(value.to_string());
            info!("API key override saved");
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.set("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStore, MemoryStore};
    use tempfile::tempdir;

    #[test]
    fn test_default_when_nothing_saved() {
        let creds = CredentialStore::load(MemoryStore::new(), "default-key");
        assert_eq!(creds.get(), "default-key");
        assert!(creds.is_using_default());
        assert_eq!(creds.override_key(), None);
    }

    #[test]
    fn test_set_empty_reverts_to_default() {
        let mut creds = CredentialStore::load(MemoryStore::new(), "default-key");
        creds.set("custom").unwrap();
        assert_eq!(creds.get(), "custom");

        creds.set("").unwrap();
        assert_eq!(creds.get(), "default-key");
        assert!(creds.is_using_default());
    }

    #[test]
    fn test_whitespace_counts_as_empty() {
        let mut creds = CredentialStore::load(MemoryStore::new(), "default-key");
        creds.set("   ").unwrap();
        assert!(creds.is_using_default());
    }

    #[test]
    fn test_override_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut creds = CredentialStore::load(JsonFileStore::open(&path).unwrap(), "default-key");
        creds.set("abc").unwrap();
        assert_eq!(creds.get(), "abc");

        let reloaded = CredentialStore::load(JsonFileStore::open(&path).unwrap(), "default-key");
        assert_eq!(reloaded.get(), "abc");
        assert!(!reloaded.is_using_default());
    }

    #[test]
    fn test_reset_removes_saved_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut creds = CredentialStore::load(JsonFileStore::open(&path).unwrap(), "default-key");
        creds.set("abc").unwrap();
        creds.reset().unwrap();

        let reloaded = CredentialStore::load(JsonFileStore::open(&path).unwrap(), "default-key");
        assert_eq!(reloaded.get(), "default-key");
    }
}
