//! Operational helpers: logging setup and match record persistence.

mod debounce;

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use matchday_types::{config::OpsConfig, MatchdayError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

pub use debounce::PersistenceWriter;

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| MatchdayError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| MatchdayError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Opaque key/value persistence used for the match record.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Value>>;
    async fn save(&self, key: &str, value: &Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Result of reading and decoding one key.
#[derive(Debug, PartialEq)]
pub enum Stored<T> {
    Missing,
    Decoded(T),
    /// The stored value did not decode. The raw value was copied to
    /// `backup_key` so a later save under the original key loses nothing.
    Unreadable { backup_key: String, error: String },
}

/// Key under which an undecodable value of `key` is preserved.
pub fn unreadable_key(key: &str) -> String {
    format!("{key}-unreadable")
}

/// Loads and decodes `key`. A value that no longer decodes is preserved
/// under [`unreadable_key`] before being reported; failing to preserve it is
/// an error.
pub async fn load_decoded<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Stored<T>> {
    let Some(value) = store.load(key).await? else {
        return Ok(Stored::Missing);
    };
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Ok(Stored::Decoded(decoded)),
        Err(err) => {
            let backup_key = unreadable_key(key);
            store.save(&backup_key, &value).await.map_err(|save_err| {
                store_error(format!(
                    "'{key}' is unreadable ({err}) and could not be preserved: {save_err}"
                ))
            })?;
            warn!(
                "Stored value for '{}' is unreadable, preserved as '{}': {}",
                key, backup_key, err
            );
            Ok(Stored::Unreadable {
                backup_key,
                error: err.to_string(),
            })
        }
    }
}

/// In-memory store, mainly for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save and remove fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.entries.lock().await.clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(store_error("memory store is read-only"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.check_writable()?;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// One pretty-printed `<key>.json` file per key inside a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|err| store_error(format!("failed to create data dir {:?}: {err}", dir)))?;
        info!("Match data directory ready at {:?}", dir);
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(store_error(format!("invalid store key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(store_error(format!("failed to read {:?}: {err}", path))),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| store_error(format!("failed to parse {:?}: {err}", path)))
    }

    /// Writes to a temporary sibling first so a crash never leaves a
    /// truncated record behind.
    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key)?;
        let body = serde_json::to_vec_pretty(value)
            .map_err(|err| store_error(format!("failed to encode '{key}': {err}")))?;
        let tmp = self.dir.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|err| store_error(format!("failed to write {:?}: {err}", tmp)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|err| store_error(format!("failed to replace {:?}: {err}", path)))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(store_error(format!("failed to remove {:?}: {err}", path))),
        }
    }
}

pub fn store_error(message: impl Into<String>) -> MatchdayError {
    MatchdayError::Persistence(message.into())
}
