use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;

use crate::storage::{ByteStream, ObjectStorage, StorageError, StoredObject};

/// One call to [`FakeStorage::upload`].
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub folder: Option<String>,
    /// Where the staged file was at upload time.
    pub path: PathBuf,
    pub content: Vec<u8>,
}

/// In-memory `ObjectStorage` that records every upload.
#[derive(Default)]
pub struct FakeStorage {
    fail_uploads: bool,
    uploads: Mutex<Vec<RecordedUpload>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the staged file, then rejects every upload.
    pub fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        folder: Option<&str>,
    ) -> Result<StoredObject, StorageError> {
        let content = tokio::fs::read(path).await?;
        let id = format!("drive-{}", uuid::Uuid::new_v4().simple());

        self.uploads.lock().unwrap().push(RecordedUpload {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            folder: folder.map(str::to_string),
            path: path.to_path_buf(),
            content: content.clone(),
        });

        if self.fail_uploads {
            return Err(StorageError::Status {
                status: 503,
                body: "storage offline".to_string(),
            });
        }

        self.objects.lock().unwrap().insert(id.clone(), content);
        Ok(StoredObject {
            locator: format!("https://storage.test/{}", id),
            id,
        })
    }

    async fn download(&self, id: &str) -> Result<ByteStream, StorageError> {
        let content = self
            .objects
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        Ok(stream::once(async move { Ok(Bytes::from(content)) }).boxed())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}
