//! Keeps an attachment record and its blob consistent across create, replace
//! and delete.
//!
//! Ordering rules:
//! - create writes the blob before the row, so a row never points at nothing.
//! - replace writes the new blob, commits the row, and only then removes the
//!   old blob.
//! - delete removes the blob first and keeps the row if that fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::content_type;
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::{Attachment, Database, DatabaseError};
use crate::validation::ValidationErrors;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "doc", "docx", "txt"];

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid upload: {0}")]
    InvalidUpload(ValidationErrors),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error("Stored file for {kind} {id} is missing")]
    BlobMissing { kind: &'static str, id: u64 },
    #[error("Storage error: {0}")]
    Storage(#[from] ObjectStoreError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

/// How downloaded content is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Read the whole blob into memory.
    Inline,
    /// Resolve the blob's location so it can be streamed from disk.
    Stream,
}

#[derive(Debug)]
pub enum DownloadContent {
    Bytes(Bytes),
    File(PathBuf),
}

#[derive(Debug)]
pub struct Download {
    pub key: String,
    pub file_name: String,
    pub content_type: &'static str,
    pub content: DownloadContent,
}

/// Check an upload against the extension allow-list and size cap.
/// Returns the lower-cased extension.
pub fn validate_upload(
    field: &str,
    upload: &Upload,
    max_size: u64,
) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let extension = Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
    if extension.is_none() {
        errors.add(
            field,
            format!(
                "The {field} field must be a file of type: {}.",
                ALLOWED_EXTENSIONS.join(", ")
            ),
        );
    }

    if upload.data.len() as u64 > max_size {
        errors.add(
            field,
            format!(
                "The {field} field must not be greater than {} kilobytes.",
                max_size / 1024
            ),
        );
    }

    match extension {
        Some(ext) if errors.is_empty() => Ok(ext),
        _ => Err(errors),
    }
}

/// Per-record async locks, keyed by (record kind, id).
#[derive(Default)]
struct RecordLocks {
    inner: Mutex<HashMap<(&'static str, u64), Weak<AsyncMutex<()>>>>,
}

impl RecordLocks {
    async fn acquire(&self, kind: &'static str, id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);
            match locks.get(&(kind, id)).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert((kind, id), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

pub struct DocumentLifecycle {
    db: Database,
    store: Arc<dyn ObjectStore>,
    max_upload_size: u64,
    locks: RecordLocks,
}

impl DocumentLifecycle {
    pub fn new(db: Database, store: Arc<dyn ObjectStore>, max_upload_size: u64) -> Self {
        Self {
            db,
            store,
            max_upload_size,
            locks: RecordLocks::default(),
        }
    }

    /// Store `upload` under a fresh key and insert `record` pointing at it.
    /// The record's id and stored path are assigned here.
    pub async fn create<R: Attachment>(
        &self,
        upload: Upload,
        mut record: R,
    ) -> Result<R, LifecycleError> {
        let extension = validate_upload(R::FILE_FIELD, &upload, self.max_upload_size)
            .map_err(LifecycleError::InvalidUpload)?;
        let key = blob_key(R::DIRECTORY, &extension);

        self.store.put(&key, upload.data).await?;

        record.set_stored_path(key.clone());
        let record = self.db.insert(record).map_err(|e| {
            // Nothing references the blob; it stays behind as garbage.
            tracing::warn!(kind = R::NAME, key = %key, error = %e, "Row insert failed after blob write");
            e
        })?;

        tracing::info!(kind = R::NAME, id = record.id(), key = %key, "Created attachment");
        Ok(record)
    }

    /// Apply `change` to the record and, when `upload` is present, swap its blob.
    pub async fn replace<R, F>(
        &self,
        id: u64,
        upload: Option<Upload>,
        change: F,
    ) -> Result<R, LifecycleError>
    where
        R: Attachment,
        F: FnOnce(&mut R) + Send,
    {
        let _guard = self.locks.acquire(R::NAME, id).await;

        let existing: R = self
            .db
            .get(id)?
            .ok_or(LifecycleError::NotFound { kind: R::NAME, id })?;

        let Some(upload) = upload else {
            let updated = self
                .db
                .update(id, change)?
                .ok_or(LifecycleError::NotFound { kind: R::NAME, id })?;
            tracing::debug!(kind = R::NAME, id, "Updated attachment fields");
            return Ok(updated);
        };

        let extension = validate_upload(R::FILE_FIELD, &upload, self.max_upload_size)
            .map_err(LifecycleError::InvalidUpload)?;
        let new_key = blob_key(R::DIRECTORY, &extension);
        self.store.put(&new_key, upload.data).await?;

        let committed = {
            let new_key = new_key.clone();
            self.db.update(id, move |record: &mut R| {
                change(record);
                record.set_stored_path(new_key);
            })
        };
        let updated = match committed {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.discard(&new_key).await;
                return Err(LifecycleError::NotFound { kind: R::NAME, id });
            }
            Err(e) => {
                self.discard(&new_key).await;
                return Err(e.into());
            }
        };

        let old_key = existing.stored_path();
        match self.store.exists(old_key).await {
            Ok(true) => {
                if let Err(e) = self.store.delete(old_key).await {
                    tracing::warn!(kind = R::NAME, id, key = %old_key, error = %e, "Failed to remove replaced blob");
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(kind = R::NAME, id, key = %old_key, error = %e, "Failed to check replaced blob");
            }
        }

        tracing::info!(kind = R::NAME, id, old_key = %old_key, new_key = %new_key, "Replaced attachment");
        Ok(updated)
    }

    /// Remove the blob, then the row. The row survives a failed blob delete.
    pub async fn delete<R: Attachment>(&self, id: u64) -> Result<R, LifecycleError> {
        let _guard = self.locks.acquire(R::NAME, id).await;

        let record: R = self
            .db
            .get(id)?
            .ok_or(LifecycleError::NotFound { kind: R::NAME, id })?;
        let key = record.stored_path();

        if self.store.exists(key).await? {
            self.store.delete(key).await?;
        } else {
            tracing::warn!(kind = R::NAME, id, key = %key, "Blob already missing on delete");
        }

        if !self.db.delete::<R>(id)? {
            return Err(LifecycleError::NotFound { kind: R::NAME, id });
        }

        tracing::info!(kind = R::NAME, id, key = %key, "Deleted attachment");
        Ok(record)
    }

    /// Locate the record's blob for download.
    pub async fn fetch_for_download<R: Attachment>(
        &self,
        id: u64,
        delivery: Delivery,
    ) -> Result<Download, LifecycleError> {
        let record: R = self
            .db
            .get(id)?
            .ok_or(LifecycleError::NotFound { kind: R::NAME, id })?;
        let key = record.stored_path().to_string();

        if !self.store.exists(&key).await? {
            tracing::warn!(kind = R::NAME, id, key = %key, "Record references a missing blob");
            return Err(LifecycleError::BlobMissing { kind: R::NAME, id });
        }

        let content = match delivery {
            Delivery::Inline => DownloadContent::Bytes(self.store.get(&key).await?),
            Delivery::Stream => DownloadContent::File(self.store.resolve(&key)?),
        };

        Ok(Download {
            file_name: key.rsplit('/').next().unwrap_or(&key).to_string(),
            content_type: content_type::for_path(&key),
            content,
            key,
        })
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to discard unreferenced blob");
        }
    }
}

/// `{directory}/{unix_timestamp}_{random_token}.{extension}`
fn blob_key(directory: &str, extension: &str) -> String {
    format!(
        "{directory}/{}_{}.{extension}",
        Utc::now().timestamp(),
        uuid::Uuid::new_v4().simple()
    )
}
