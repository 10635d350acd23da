use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::blob_ref::{BlobInfo, BlobRef, StoredBlob};
use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Reference-addressed blob storage.
///
/// Every `put` allocates a fresh [`BlobRef`]; storing the same bytes twice
/// yields two independent blobs. Implementations must make each call atomic
/// for its own payload and durable once `put` returns.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return the reference of the new blob.
    async fn put(&self, data: &[u8], info: &BlobInfo) -> Result<BlobRef, StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(blob_ref).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, blob_ref: &BlobRef) -> Result<BoxReader, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, blob_ref: &BlobRef) -> Result<bool, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, blob_ref: &BlobRef) -> Result<bool, StorageError>;

    /// Describe a stored blob without reading its bytes.
    async fn stat(&self, blob_ref: &BlobRef) -> Result<StoredBlob, StorageError>;
}
