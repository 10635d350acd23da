use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::blob_ref::{BlobInfo, BlobRef, StoredBlob};
use super::checksum::Checksum;
use super::error::StorageError;
use super::traits::{BlobStore, BoxReader};

/// In-process blob store.
///
/// Cheap to clone; clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<BlobRef, (StoredBlob, Arc<Vec<u8>>)>>,
    fail_puts: Arc<AtomicBool>,
    /// When non-zero, this many further puts succeed before failing.
    fail_after: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with an I/O error.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_after.store(0, Ordering::SeqCst);
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Let `n` more puts succeed, then fail every `put` after them.
    pub fn fail_puts_after(&self, n: usize) {
        self.fail_after.store(n, Ordering::SeqCst);
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// References of every stored blob, in creation order.
    pub fn refs(&self) -> Vec<BlobRef> {
        let mut refs: Vec<BlobRef> = self.blobs.iter().map(|e| *e.key()).collect();
        refs.sort();
        refs
    }

    fn should_fail(&self) -> bool {
        if !self.fail_puts.load(Ordering::SeqCst) {
            return false;
        }
        self.fail_after
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: &[u8], info: &BlobInfo) -> Result<BlobRef, StorageError> {
        if self.should_fail() {
            return Err(StorageError::Io(std::io::Error::other(
                "memory blob store: injected write failure",
            )));
        }

        let blob_ref = BlobRef::generate();
        let stored = StoredBlob {
            blob_ref,
            info: info.clone(),
            size: data.len() as u64,
            checksum: Checksum::compute(data),
            created_at: Utc::now(),
        };
        self.blobs.insert(blob_ref, (stored, Arc::new(data.to_vec())));
        Ok(blob_ref)
    }

    async fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .get(blob_ref)
            .map(|entry| entry.1.as_ref().clone())
            .ok_or_else(|| StorageError::NotFound(blob_ref.to_hex()))
    }

    async fn get_stream(&self, blob_ref: &BlobRef) -> Result<BoxReader, StorageError> {
        let data = self.get(blob_ref).await?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn exists(&self, blob_ref: &BlobRef) -> Result<bool, StorageError> {
        Ok(self.blobs.contains_key(blob_ref))
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<bool, StorageError> {
        Ok(self.blobs.remove(blob_ref).is_some())
    }

    async fn stat(&self, blob_ref: &BlobRef) -> Result<StoredBlob, StorageError> {
        self.blobs
            .get(blob_ref)
            .map(|entry| entry.0.clone())
            .ok_or_else(|| StorageError::NotFound(blob_ref.to_hex()))
    }
}
