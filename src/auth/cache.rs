//! Token cache backends
//!
//! The token store persists every token mutation through an injected
//! [`TokenCache`], so tests can substitute an in-memory cache for the
//! durable file used in production.

use super::types::TokenRecord;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Durable storage for one credential identity's token record
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Load the stored record, if any
    async fn load(&self) -> Result<Option<TokenRecord>>;

    /// Persist the record, replacing any previous one
    async fn save(&self, record: &TokenRecord) -> Result<()>;
}

/// File-backed token cache (one JSON file per credential identity)
///
/// Writes go to a temp file first and are renamed into place. Concurrent
/// processes sharing the same cache file are not coordinated: the last
/// writer wins, which is an accepted limitation.
#[derive(Debug)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    /// Create a cache at the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The cache file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenCache for FileTokenCache {
    async fn load(&self) -> Result<Option<TokenRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::token_cache(format!("failed to read token cache: {e}")))?;

        let record = serde_json::from_str(&contents)
            .map_err(|e| Error::token_cache(format!("failed to parse token cache: {e}")))?;
        Ok(Some(record))
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::token_cache(format!("failed to create cache directory: {e}"))
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| Error::token_cache(format!("failed to serialize token record: {e}")))?;

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::token_cache(format!("failed to write token cache: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::token_cache(format!("failed to rename token cache: {e}")))?;

        Ok(())
    }
}

/// In-memory token cache for tests and single-shot runs
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    record: Mutex<Option<TokenRecord>>,
}

impl MemoryTokenCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache pre-seeded with a record
    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn load(&self) -> Result<Option<TokenRecord>> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        *self.record.lock().await = Some(record.clone());
        Ok(())
    }
}
