//! Draft storage
//!
//! [`DraftStore`] is a key/value repository for persisted drafts. Writes are
//! last-write-wins: a `put` replaces whatever another writer stored under the
//! same key, with no locking or merge. Concurrent sessions editing the same
//! (network function, version) overwrite each other.
//!
//! [`DraftRepository`] layers the typed documents on top and turns parse
//! failures into "no draft".

use crate::document::{DraftDocument, FormState};
use crate::error::{DraftError, DraftResult};
use async_trait::async_trait;
use dashmap::DashMap;
use naavi_model::DraftKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key/value store for serialized drafts
#[async_trait]
pub trait DraftStore: Send + Sync + std::fmt::Debug {
    /// Raw value under `key`
    async fn get(&self, key: &str) -> DraftResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: String) -> DraftResult<()>;

    /// Remove `key`; returns whether it existed
    async fn remove(&self, key: &str) -> DraftResult<bool>;

    /// All stored keys
    async fn keys(&self) -> DraftResult<Vec<String>>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: DashMap<String, String>,
}

impl MemoryDraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get(&self, key: &str) -> DraftResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: String) -> DraftResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> DraftResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn keys(&self) -> DraftResult<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

/// Directory-backed store, one JSON file per key
///
/// File names are the hex-encoded key, so arbitrary network-function names
/// are safe on disk. Writes go to a temporary file first and are renamed into
/// place.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    /// Open (and create) a draft directory
    ///
    /// # Errors
    /// Returns `DraftError::Io` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> DraftResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DraftError::io(&dir, e))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key.as_bytes())))
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn get(&self, key: &str) -> DraftResult<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DraftError::io(path, e)),
        }
    }

    async fn put(&self, key: &str, value: String) -> DraftResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| DraftError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| DraftError::io(&path, e))
    }

    async fn remove(&self, key: &str) -> DraftResult<bool> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DraftError::io(path, e)),
        }
    }

    async fn keys(&self) -> DraftResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| DraftError::io(&self.dir, e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DraftError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let key = hex::decode(stem)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| DraftError::InvalidKey(stem.to_string()))?;
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Typed access to the drafts of a store
#[derive(Debug, Clone)]
pub struct DraftRepository {
    store: Arc<dyn DraftStore>,
}

impl DraftRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DraftStore>) -> Self {
        Self { store }
    }

    /// Repository over a fresh in-memory store
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDraftStore::new()))
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DraftStore> {
        &self.store
    }

    /// Reconciled draft for `key`
    ///
    /// Missing, unreadable and malformed drafts all yield `None`; the failure
    /// is logged.
    pub async fn load_document(&self, key: &DraftKey) -> Option<DraftDocument> {
        self.load_json(&key.form_data_key()).await
    }

    /// Persist the reconciled draft
    ///
    /// # Errors
    /// Propagates serialization and store failures.
    pub async fn save_document(&self, document: &DraftDocument) -> DraftResult<()> {
        self.save_json(&document.key().form_data_key(), document).await
    }

    /// Raw form state for `key`, `None` when missing or malformed
    pub async fn load_form_state(&self, key: &DraftKey) -> Option<FormState> {
        self.load_json(&key.questionnaire_key()).await
    }

    /// Persist the raw form state
    ///
    /// # Errors
    /// Propagates serialization and store failures.
    pub async fn save_form_state(&self, key: &DraftKey, state: &FormState) -> DraftResult<()> {
        self.save_json(&key.questionnaire_key(), state).await
    }

    /// Remove every key belonging to the key's network function
    ///
    /// Covers all versions: `formData-<nf>*` and `questionnaire-<nf>*`.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn clear_network_function(&self, key: &DraftKey) -> DraftResult<usize> {
        let prefixes = key.network_function_prefixes();
        let mut removed = 0;
        for stored in self.store.keys().await? {
            if prefixes.iter().any(|p| stored.starts_with(p.as_str()))
                && self.store.remove(&stored).await?
            {
                removed += 1;
            }
        }
        tracing::info!(
            network_function = %key.network_function,
            removed,
            "cleared persisted drafts"
        );
        Ok(removed)
    }

    async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read persisted draft; ignoring it");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(source) => {
                let e = DraftError::Parse {
                    key: key.to_string(),
                    source,
                };
                tracing::warn!(error = %e, "treating malformed draft as absent");
                None
            }
        }
    }

    async fn save_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> DraftResult<()> {
        let raw = serde_json::to_string(value).map_err(|source| DraftError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store.put(key, raw).await?;
        tracing::debug!(key, "persisted draft");
        Ok(())
    }
}
