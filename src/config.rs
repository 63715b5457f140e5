use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings keys, mirroring the browser playground's storage names.
pub const KEY_ACCESS_KEY: &str = "access_key";
pub const KEY_SECRET_KEY: &str = "secret_key";
pub const KEY_ENDPOINT: &str = "endpoint";
pub const KEY_BEDROCK_API_KEY: &str = "bedrock_api_key";
pub const KEY_REGION: &str = "region";
pub const KEY_MODEL_ID: &str = "model_id";
pub const KEY_STREAMING: &str = "streaming";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";

/// Key/value persistence for credentials and preferences. Callers decide
/// where the values live; the rest of the crate only sees this interface.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Flat key/value table persisted as TOML under the user's home directory.
pub struct TomlStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl TomlStore {
    /// Open the default store at `~/.bedrock-chat/settings.toml`.
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::open(home.join(".bedrock-chat").join("settings.toml"))
    }

    /// Open a store at an explicit path, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let values = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read settings file")?;
            toml::from_str(&content).context("Failed to parse settings file")?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(&self.values).context("Failed to serialize settings")?;
        fs::write(&self.path, content).context("Failed to write settings file")?;
        Ok(())
    }
}

impl SettingsStore for TomlStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed view over a settings store, threaded into the client and the
/// controller instead of reading ambient state.
#[derive(Debug, Clone)]
pub struct Settings {
    pub access_key: String,
    pub secret_key: String,
    /// Endpoint override; the regional Bedrock runtime endpoint when unset.
    pub endpoint: Option<String>,
    /// Extra API key the reverse proxy checks, sent as `x-bedrock-api-key`.
    pub api_key: Option<String>,
    pub region: String,
    pub model_id: String,
    pub streaming: bool,
}

impl Settings {
    pub fn from_store(store: &dyn SettingsStore) -> Self {
        let non_empty = |key: &str| store.get(key).filter(|value| !value.is_empty());
        Self {
            access_key: store.get(KEY_ACCESS_KEY).unwrap_or_default(),
            secret_key: store.get(KEY_SECRET_KEY).unwrap_or_default(),
            endpoint: non_empty(KEY_ENDPOINT),
            api_key: non_empty(KEY_BEDROCK_API_KEY),
            region: non_empty(KEY_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            model_id: non_empty(KEY_MODEL_ID).unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            streaming: store
                .get(KEY_STREAMING)
                .map(|value| value != "false")
                .unwrap_or(true),
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_store_is_empty() {
        let store = MemoryStore::default();
        let settings = Settings::from_store(&store);
        assert!(!settings.has_credentials());
        assert_eq!(settings.region, DEFAULT_REGION);
        assert_eq!(settings.model_id, DEFAULT_MODEL_ID);
        assert!(settings.streaming);
        assert!(settings.endpoint.is_none());
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn reads_values_through_the_store() {
        let mut store = MemoryStore::default();
        store.set(KEY_ACCESS_KEY, "AKIA123").unwrap();
        store.set(KEY_SECRET_KEY, "shhh").unwrap();
        store.set(KEY_ENDPOINT, "http://localhost:8000").unwrap();
        store.set(KEY_STREAMING, "false").unwrap();

        let settings = Settings::from_store(&store);
        assert!(settings.has_credentials());
        assert_eq!(settings.endpoint.as_deref(), Some("http://localhost:8000"));
        assert!(!settings.streaming);
    }

    #[test]
    fn empty_strings_do_not_override_defaults() {
        let mut store = MemoryStore::default();
        store.set(KEY_ENDPOINT, "").unwrap();
        store.set(KEY_MODEL_ID, "").unwrap();

        let settings = Settings::from_store(&store);
        assert!(settings.endpoint.is_none());
        assert_eq!(settings.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn toml_store_round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut store = TomlStore::open(&path).unwrap();
        store.set(KEY_ACCESS_KEY, "AKIA123").unwrap();
        store.set(KEY_REGION, "cn-north-1").unwrap();

        let reopened = TomlStore::open(&path).unwrap();
        assert_eq!(reopened.get(KEY_ACCESS_KEY).as_deref(), Some("AKIA123"));
        assert_eq!(reopened.get(KEY_REGION).as_deref(), Some("cn-north-1"));
        assert_eq!(reopened.get(KEY_SECRET_KEY), None);
    }

    #[test]
    fn toml_store_overwrites_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut store = TomlStore::open(&path).unwrap();
        store.set(KEY_MODEL_ID, "first").unwrap();
        store.set(KEY_MODEL_ID, "second").unwrap();
        assert_eq!(store.get(KEY_MODEL_ID).as_deref(), Some("second"));
    }
}
