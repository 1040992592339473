//! Key-addressed blob storage for uploaded photo bytes.
//!
//! The pipeline only sees the [`BlobStore`] trait (`put`/`get`/`delete` by
//! key). [`FsBlobStore`] implements it on the local filesystem and hands out
//! URLs under a configurable public base, which `GET /media/*key` serves.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("Blob storage I/O error: {0}")]
    Io(String),

    #[error("Blob metadata error: {0}")]
    Metadata(String),
}

/// What to attach to an object when storing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PutOptions {
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

/// Location of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub key: String,
}

/// An object read back from the store.
#[derive(Debug, Clone)]
pub struct BlobObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bytes: &[u8], key: &str, options: PutOptions)
        -> Result<StoredBlob, BlobError>;

    async fn get(&self, key: &str) -> Result<BlobObject, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Turn a slash-separated key into a relative path, rejecting anything that
/// could escape the base directory.
fn key_to_relative(key: &str) -> Result<PathBuf, BlobError> {
    if key.is_empty() || key.contains('\\') || key.contains('\0') {
        return Err(BlobError::InvalidKey(key.to_string()));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(key).components() {
        match component {
            Component::Normal(c) => relative.push(c),
            _ => return Err(BlobError::InvalidKey(key.to_string())),
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(relative)
}

/// Sidecar file holding content type and metadata next to each object.
fn sidecar_path(object_path: &Path) -> PathBuf {
    let mut name = object_path.as_os_str().to_os_string();
    name.push(".meta.json");
    PathBuf::from(name)
}

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub async fn new(base_path: PathBuf, public_base_url: String) -> Result<Self, BlobError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            BlobError::Io(format!(
                "Failed to create blob directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Blob store initialized");

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        Ok(self.base_path.join(key_to_relative(key)?))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        bytes: &[u8],
        key: &str,
        options: PutOptions,
    ) -> Result<StoredBlob, BlobError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Io(format!("Failed to write blob {key}: {e}")))?;

        let meta = serde_json::to_vec(&options).map_err(|e| BlobError::Metadata(e.to_string()))?;
        fs::write(sidecar_path(&path), meta)
            .await
            .map_err(|e| BlobError::Io(format!("Failed to write metadata for {key}: {e}")))?;

        debug!(key = %key, size = bytes.len(), "Stored blob");
        Ok(StoredBlob {
            url: self.url_for(key),
            key: key.to_string(),
        })
    }

    async fn get(&self, key: &str) -> Result<BlobObject, BlobError> {
        let path = self.object_path(key)?;

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => return Err(BlobError::Io(format!("Failed to read blob {key}: {e}"))),
        };

        // Objects written without a sidecar are served as opaque bytes.
        let content_type = match fs::read(sidecar_path(&path)).await {
            Ok(raw) => {
                serde_json::from_slice::<PutOptions>(&raw)
                    .map_err(|e| BlobError::Metadata(e.to_string()))?
                    .content_type
            }
            Err(_) => "application/octet-stream".to_string(),
        };

        debug!(key = %key, size = bytes.len(), "Retrieved blob");
        Ok(BlobObject {
            bytes,
            content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.object_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => return Err(BlobError::Io(format!("Failed to delete blob {key}: {e}"))),
        }
        let _ = fs::remove_file(sidecar_path(&path)).await;

        debug!(key = %key, "Deleted blob");
        Ok(())
    }
}
