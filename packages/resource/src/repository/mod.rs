//! Persistence of file records.
//!
//! Both implementations upsert by id, assign a UUIDv7 on first insert, stamp
//! `created`/`modified` and bump `version` on every save. Writers that read a
//! record before updating it go through `save_if_version` so a concurrent
//! update is detected instead of overwritten.

pub mod database;
pub mod memory;

use async_trait::async_trait;
use common::ConversionStatus;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::FileRecord;

pub use database::DbFileRecordRepository;
pub use memory::MemoryFileRecordRepository;

#[async_trait]
pub trait FileRecordRepository: Send + Sync {
    /// Insert or update by id; returns the record as persisted.
    async fn save(&self, record: FileRecord) -> Result<FileRecord, RepositoryError>;

    /// Update an existing record only while its stored version still equals
    /// `expected_version`.
    ///
    /// Returns `None` when the row was changed or deleted since it was read;
    /// nothing is written in that case.
    async fn save_if_version(
        &self,
        record: FileRecord,
        expected_version: i64,
    ) -> Result<Option<FileRecord>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, RepositoryError>;

    /// Deleting an unknown id is not an error.
    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// At most `limit` records in the given status, in no particular order.
    async fn find_by_status(
        &self,
        status: ConversionStatus,
        limit: u64,
    ) -> Result<Vec<FileRecord>, RepositoryError>;

    async fn find_all(&self) -> Result<Vec<FileRecord>, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;

    /// Records whose filename contains `filter`. Inactive records are only
    /// included when `show_inactive` is set.
    async fn find_matching(
        &self,
        filter: Option<&str>,
        show_inactive: bool,
    ) -> Result<Vec<FileRecord>, RepositoryError>;

    async fn count_matching(
        &self,
        filter: Option<&str>,
        show_inactive: bool,
    ) -> Result<u64, RepositoryError>;
}
