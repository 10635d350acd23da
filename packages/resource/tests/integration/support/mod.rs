#![allow(dead_code)]

use std::sync::Arc;

use common::config::SchedulerConfig;
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use converter::Converter;
use resource::{
    ConversionScheduler, FileContent, FileRecord, FileRecordRepository,
    MemoryFileRecordRepository, ResourceService,
};
use tempfile::TempDir;
use uuid::Uuid;

/// A lifecycle service over a filesystem blob store in a scratch directory
/// and an in-memory repository.
pub struct TestApp {
    pub service: ResourceService,
    pub repo: MemoryFileRecordRepository,
    pub blobs: Arc<FilesystemBlobStore>,
    _storage: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let storage = tempfile::tempdir().unwrap();
        let blobs = Arc::new(
            FilesystemBlobStore::new(storage.path().to_path_buf(), 16 * 1024 * 1024)
                .await
                .unwrap(),
        );
        let repo = MemoryFileRecordRepository::new();
        let service = ResourceService::new(Arc::new(repo.clone()), blobs.clone());
        Self {
            service,
            repo,
            blobs,
            _storage: storage,
        }
    }

    pub fn scheduler(&self, converter: Arc<dyn Converter>) -> ConversionScheduler {
        ConversionScheduler::new(
            Arc::new(self.repo.clone()),
            self.blobs.clone(),
            converter,
            SchedulerConfig::default(),
        )
    }

    pub async fn save_new(&self, filename: &str, mime_type: &str, content: &[u8]) -> FileRecord {
        self.service
            .save(
                FileRecord::new(filename, mime_type),
                FileContent::new(content.to_vec()),
            )
            .await
            .unwrap()
    }

    pub async fn stored(&self, id: Uuid) -> FileRecord {
        self.repo.find_by_id(id).await.unwrap().unwrap()
    }

    /// Whether each blob the record references is present in the store.
    pub async fn blobs_present(&self, record: &FileRecord) -> Vec<bool> {
        let mut found = Vec::new();
        for blob_ref in record.blob_refs() {
            found.push(self.blobs.exists(&blob_ref).await.unwrap());
        }
        found
    }
}
