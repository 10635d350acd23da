use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::BufReader;
use tracing::{debug, warn};

use super::blob_ref::{BlobInfo, BlobRef, StoredBlob};
use super::checksum::Checksum;
use super::error::StorageError;
use super::traits::{BlobStore, BoxReader};

/// Filesystem-backed blob store.
///
/// Blobs are stored in a sharded directory layout:
/// `{base_path}/{first 2 hex chars}/{remaining 30 hex chars}` with a
/// `.meta.json` sidecar next to each payload.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    fn blob_path(&self, blob_ref: &BlobRef) -> PathBuf {
        self.base_path
            .join(blob_ref.shard_prefix())
            .join(blob_ref.shard_suffix())
    }

    fn meta_path(&self, blob_ref: &BlobRef) -> PathBuf {
        self.base_path
            .join(blob_ref.shard_prefix())
            .join(format!("{}.meta.json", blob_ref.shard_suffix()))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn write_atomic(&self, target: &PathBuf, data: &[u8]) -> Result<(), StorageError> {
        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }
}

async fn write_synced(path: &PathBuf, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    tokio::io::AsyncWriteExt::write_all(&mut file, data).await?;
    file.sync_all().await
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, data: &[u8], info: &BlobInfo) -> Result<BlobRef, StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let blob_ref = BlobRef::generate();
        let stored = StoredBlob {
            blob_ref,
            info: info.clone(),
            size: data.len() as u64,
            checksum: Checksum::compute(data),
            created_at: Utc::now(),
        };
        let meta = serde_json::to_vec_pretty(&stored)?;

        // Sidecar lands first so a visible payload always has metadata.
        let meta_path = self.meta_path(&blob_ref);
        self.write_atomic(&meta_path, &meta).await?;

        if let Err(e) = self.write_atomic(&self.blob_path(&blob_ref), data).await {
            warn!(blob = %blob_ref, error = %e, "Blob payload write failed");
            let _ = fs::remove_file(&meta_path).await;
            return Err(e);
        }

        debug!(blob = %blob_ref, name = %info.name, size = stored.size, "Blob stored");
        Ok(blob_ref)
    }

    async fn get_stream(&self, blob_ref: &BlobRef) -> Result<BoxReader, StorageError> {
        let blob_path = self.blob_path(blob_ref);
        match fs::File::open(&blob_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(blob_ref.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, blob_ref: &BlobRef) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(blob_ref)).await?)
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<bool, StorageError> {
        let deleted = match fs::remove_file(self.blob_path(blob_ref)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        match fs::remove_file(self.meta_path(blob_ref)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!(blob = %blob_ref, deleted, "Blob deleted");
        Ok(deleted)
    }

    async fn stat(&self, blob_ref: &BlobRef) -> Result<StoredBlob, StorageError> {
        if !self.exists(blob_ref).await? {
            return Err(StorageError::NotFound(blob_ref.to_hex()));
        }
        match fs::read(self.meta_path(blob_ref)).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(blob_ref.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
