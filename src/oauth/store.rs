use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::error::NpauthError;
use crate::oauth::token::TokenRecord;

/// Key-value persistence of token records, keyed by user identity.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, user: &str) -> Result<Option<TokenRecord>, NpauthError>;

    /// Upsert: replaces any record stored for `record.user_identity`.
    async fn put(&self, record: &TokenRecord) -> Result<(), NpauthError>;

    /// Idempotent; deleting a missing record succeeds.
    async fn delete(&self, user: &str) -> Result<(), NpauthError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, user: &str) -> Result<Option<TokenRecord>, NpauthError> {
        Ok(self.records.read().await.get(user).cloned())
    }

    async fn put(&self, record: &TokenRecord) -> Result<(), NpauthError> {
        self.records
            .write()
            .await
            .insert(record.user_identity.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, user: &str) -> Result<(), NpauthError> {
        self.records.write().await.remove(user);
        Ok(())
    }
}

/// One JSON file per identity under `directory`.
///
/// File names are the base64url SHA-256 of the identity, so handles with
/// `#`, `/` or non-ASCII characters map to safe, fixed-length names.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    directory: PathBuf,
}

impl FileTokenStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn record_path(&self, user: &str) -> PathBuf {
        let digest = Sha256::digest(user.as_bytes());
        self.directory
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(digest)))
    }
}

fn unavailable(action: &str, path: &Path, err: impl std::fmt::Display) -> NpauthError {
    NpauthError::StoreUnavailable(format!("cannot {action} {}: {err}", path.display()))
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, user: &str) -> Result<Option<TokenRecord>, NpauthError> {
        let path = self.record_path(user);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable("read", &path, e)),
        };
        let record: TokenRecord =
            serde_json::from_str(&data).map_err(|e| unavailable("parse", &path, e))?;
        Ok(Some(record))
    }

    async fn put(&self, record: &TokenRecord) -> Result<(), NpauthError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| unavailable("create", &self.directory, e))?;

        let path = self.record_path(&record.user_identity);
        let data = serde_json::to_string_pretty(record)
            .map_err(|e| unavailable("serialize record for", &path, e))?;

        // Write aside, then rename over the target so readers never see a partial record.
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| unavailable("write", &tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(unavailable("replace", &path, e));
        }
        Ok(())
    }

    async fn delete(&self, user: &str) -> Result<(), NpauthError> {
        let path = self.record_path(user);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable("delete", &path, e)),
        }
    }
}
