//! External object storage for packaged attachments and the file library.

pub mod drive;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

pub use drive::DriveClient;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage is not configured: {0}")]
    Config(String),

    #[error("Storage authorization failed: {0}")]
    Auth(String),

    #[error("Stored object not found: {0}")]
    NotFound(String),

    #[error("Storage request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected storage response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Identity of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub id: String,
    /// Shareable link to the object.
    pub locator: String,
}

pub type ByteStream = BoxStream<'static, Result<Bytes, StorageError>>;

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Uploads the file at `path` under `name`, optionally inside `folder`.
    async fn upload(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        folder: Option<&str>,
    ) -> Result<StoredObject, StorageError>;

    async fn download(&self, id: &str) -> Result<ByteStream, StorageError>;

    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}
