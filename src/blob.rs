//! Storage for uploaded proof images.
//!
//! The engine only ever sees the reference a store hands back; bytes are never
//! interpreted beyond the upload checks in [`validate_upload`].

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::BingoError;

pub type BlobResult<T> = Result<T, BlobError>;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob not found: {0}")]
    NotFound(String),
}

impl From<BlobError> for BingoError {
    fn from(e: BlobError) -> Self {
        BingoError::Storage(e.to_string())
    }
}

/// Accepted image types as (mime type, file extension)
const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// File extension for an accepted image mime type
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.trim().to_ascii_lowercase();
    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, ext)| *ext)
}

/// Check an upload against the image whitelist and size limit
pub fn validate_upload(bytes: &[u8], mime: &str, max_bytes: usize) -> Result<(), BingoError> {
    if bytes.is_empty() {
        return Err(BingoError::InvalidInput("No file uploaded".to_string()));
    }
    if extension_for_mime(mime).is_none() {
        return Err(BingoError::UnsupportedMediaType(mime.to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(BingoError::PayloadTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    Ok(())
}

/// Opaque store for proof images
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the bytes and return a stable location reference
    async fn put(&self, bytes: &[u8], mime: &str) -> BlobResult<String>;

    async fn get(&self, reference: &str) -> BlobResult<Vec<u8>>;
}

/// Content-addressed name for a blob: `proof-<sha256>.<ext>`
fn blob_name(bytes: &[u8], mime: &str) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    let ext = extension_for_mime(mime).unwrap_or("bin");
    format!("proof-{}.{}", digest, ext)
}

/// Blob store writing into a directory on the local filesystem
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bytes: &[u8], mime: &str) -> BlobResult<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let name = blob_name(bytes, mime);
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path.to_string_lossy().into_owned())
    }

    async fn get(&self, reference: &str) -> BlobResult<Vec<u8>> {
        let path = PathBuf::from(reference);
        if !path.starts_with(&self.root) {
            return Err(BlobError::NotFound(reference.to_string()));
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob store, for tests and ephemeral deployments
#[derive(Default, Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: &[u8], mime: &str) -> BlobResult<String> {
        let reference = format!("memory://{}", blob_name(bytes, mime));
        self.blobs
            .write()
            .await
            .insert(reference.clone(), bytes.to_vec());
        Ok(reference)
    }

    async fn get(&self, reference: &str) -> BlobResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(reference.to_string()))
    }
}
