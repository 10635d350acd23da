use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::ConversionStatus;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::FileRecordRepository;
use crate::error::RepositoryError;
use crate::models::FileRecord;

/// In-process repository backed by a concurrent map.
///
/// Clones share the same map. Each save is atomic per id.
#[derive(Clone, Default)]
pub struct MemoryFileRecordRepository {
    records: Arc<DashMap<Uuid, FileRecord>>,
}

impl MemoryFileRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self, mut records: Vec<FileRecord>) -> Vec<FileRecord> {
        records.sort_by_key(|r| r.id);
        records
    }
}

fn bump(record: &mut FileRecord, previous: &FileRecord) {
    record.audit.created = previous.audit.created;
    record.audit.created_by = previous.audit.created_by.clone();
    record.audit.version = Some(previous.audit.version.unwrap_or(0) + 1);
    record.audit.modified = Some(Utc::now());
}

fn matches(record: &FileRecord, filter: Option<&str>, show_inactive: bool) -> bool {
    if !show_inactive && !record.is_active {
        return false;
    }
    match filter {
        Some(filter) if !filter.is_empty() => record.filename.contains(filter),
        _ => true,
    }
}

#[async_trait]
impl FileRecordRepository for MemoryFileRecordRepository {
    async fn save(&self, mut record: FileRecord) -> Result<FileRecord, RepositoryError> {
        let id = *record.id.get_or_insert_with(Uuid::now_v7);

        match self.records.entry(id) {
            Entry::Occupied(mut entry) => {
                bump(&mut record, entry.get());
                entry.insert(record.clone());
            }
            Entry::Vacant(entry) => {
                let now = Utc::now();
                record.audit.created.get_or_insert(now);
                record.audit.modified = Some(now);
                record.audit.version = Some(0);
                entry.insert(record.clone());
            }
        }

        Ok(record)
    }

    async fn save_if_version(
        &self,
        mut record: FileRecord,
        expected_version: i64,
    ) -> Result<Option<FileRecord>, RepositoryError> {
        let Some(id) = record.id else {
            return Ok(None);
        };

        match self.records.entry(id) {
            Entry::Occupied(mut entry)
                if entry.get().audit.version.unwrap_or(0) == expected_version =>
            {
                bump(&mut record, entry.get());
                entry.insert(record.clone());
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, RepositoryError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.records.remove(&id);
        Ok(())
    }

    async fn find_by_status(
        &self,
        status: ConversionStatus,
        limit: u64,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let found = self
            .records
            .iter()
            .filter(|r| r.conversion_status == status)
            .map(|r| r.clone())
            .collect();
        let mut found = self.sorted(found);
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>, RepositoryError> {
        let all = self.records.iter().map(|r| r.clone()).collect();
        Ok(self.sorted(all))
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.records.len() as u64)
    }

    async fn find_matching(
        &self,
        filter: Option<&str>,
        show_inactive: bool,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let found = self
            .records
            .iter()
            .filter(|r| matches(r, filter, show_inactive))
            .map(|r| r.clone())
            .collect();
        Ok(self.sorted(found))
    }

    async fn count_matching(
        &self,
        filter: Option<&str>,
        show_inactive: bool,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .records
            .iter()
            .filter(|r| matches(r, filter, show_inactive))
            .count() as u64)
    }
}
