use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::ConversionStatus;
use common::storage::{BlobRef, Checksum};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    NotSet, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::FileRecordRepository;
use crate::entity::stored_file;
use crate::error::RepositoryError;
use crate::models::{Audit, FileRecord};

/// SeaORM-backed repository over the `stored_file` table.
#[derive(Clone)]
pub struct DbFileRecordRepository {
    db: DatabaseConnection,
}

impl DbFileRecordRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn parse_ref(id: Uuid, raw: Option<String>) -> Result<Option<BlobRef>, RepositoryError> {
    raw.map(|s| {
        BlobRef::parse(&s).map_err(|e| RepositoryError::Corrupt {
            id,
            message: e.to_string(),
        })
    })
    .transpose()
}

fn into_record(model: stored_file::Model) -> Result<FileRecord, RepositoryError> {
    let id = model.id;
    let checksum = model
        .checksum
        .map(|s| Checksum::from_hex(&s))
        .transpose()
        .map_err(|e| RepositoryError::Corrupt {
            id,
            message: e.to_string(),
        })?;
    let metadata: HashMap<String, String> = if model.metadata.is_null() {
        HashMap::new()
    } else {
        serde_json::from_value(model.metadata).map_err(|e| RepositoryError::Corrupt {
            id,
            message: format!("metadata: {e}"),
        })?
    };

    Ok(FileRecord {
        id: Some(id),
        filename: model.filename,
        mime_type: model.mime_type,
        filesize: model.filesize,
        content_ref: parse_ref(id, model.content_ref)?,
        original_content_ref: parse_ref(id, model.original_content_ref)?,
        converted_content_ref: parse_ref(id, model.converted_content_ref)?,
        checksum,
        conversion_status: model.conversion_status,
        metadata,
        related_object_id: model.related_object_id,
        related_object_class: model.related_object_class,
        audit: Audit {
            created_by: model.created_by,
            created: Some(model.created_at),
            modified_by: model.modified_by,
            modified: Some(model.modified_at),
            version: Some(model.version),
        },
        is_active: model.is_active,
    })
}

fn into_records(models: Vec<stored_file::Model>) -> Result<Vec<FileRecord>, RepositoryError> {
    models.into_iter().map(into_record).collect()
}

/// Every column taken from the record; audit columns are left to the caller.
fn active_model(
    id: Uuid,
    record: FileRecord,
) -> Result<stored_file::ActiveModel, RepositoryError> {
    let metadata = serde_json::to_value(&record.metadata).map_err(|e| {
        RepositoryError::Corrupt {
            id,
            message: format!("metadata: {e}"),
        }
    })?;

    Ok(stored_file::ActiveModel {
        id: Set(id),
        filename: Set(record.filename),
        mime_type: Set(record.mime_type),
        filesize: Set(record.filesize),
        content_ref: Set(record.content_ref.map(|r| r.to_hex())),
        original_content_ref: Set(record.original_content_ref.map(|r| r.to_hex())),
        converted_content_ref: Set(record.converted_content_ref.map(|r| r.to_hex())),
        checksum: Set(record.checksum.map(|c| c.to_hex())),
        conversion_status: Set(record.conversion_status),
        metadata: Set(metadata),
        related_object_id: Set(record.related_object_id),
        related_object_class: Set(record.related_object_class),
        created_by: NotSet,
        created_at: NotSet,
        modified_by: Set(record.audit.modified_by),
        modified_at: NotSet,
        version: NotSet,
        is_active: Set(record.is_active),
    })
}

fn matching_condition(filter: Option<&str>, show_inactive: bool) -> Condition {
    let mut condition = Condition::all();
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        condition = condition.add(stored_file::Column::Filename.contains(filter));
    }
    if !show_inactive {
        condition = condition.add(stored_file::Column::IsActive.eq(true));
    }
    condition
}

#[async_trait]
impl FileRecordRepository for DbFileRecordRepository {
    async fn save(&self, record: FileRecord) -> Result<FileRecord, RepositoryError> {
        let id = record.id.unwrap_or_else(Uuid::now_v7);
        let existing = stored_file::Entity::find_by_id(id).one(&self.db).await?;
        let now = Utc::now();

        let (created_at, created_by, version) = match &existing {
            Some(row) => (row.created_at, row.created_by.clone(), row.version + 1),
            None => (
                record.audit.created.unwrap_or(now),
                record.audit.created_by.clone(),
                0,
            ),
        };

        let mut active = active_model(id, record)?;
        active.created_by = Set(created_by);
        active.created_at = Set(created_at);
        active.modified_at = Set(now);
        active.version = Set(version);

        let model = if existing.is_some() {
            active.update(&self.db).await?
        } else {
            active.insert(&self.db).await?
        };

        into_record(model)
    }

    async fn save_if_version(
        &self,
        record: FileRecord,
        expected_version: i64,
    ) -> Result<Option<FileRecord>, RepositoryError> {
        let Some(id) = record.id else {
            return Ok(None);
        };

        let mut active = active_model(id, record)?;
        active.id = NotSet;
        active.modified_at = Set(Utc::now());
        active.version = Set(expected_version + 1);

        let result = stored_file::Entity::update_many()
            .set(active)
            .filter(stored_file::Column::Id.eq(id))
            .filter(stored_file::Column::Version.eq(expected_version))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, RepositoryError> {
        stored_file::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(into_record)
            .transpose()
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError> {
        stored_file::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    async fn find_by_status(
        &self,
        status: ConversionStatus,
        limit: u64,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let models = stored_file::Entity::find()
            .filter(stored_file::Column::ConversionStatus.eq(status))
            .order_by_asc(stored_file::Column::ModifiedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        into_records(models)
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>, RepositoryError> {
        let models = stored_file::Entity::find()
            .order_by_asc(stored_file::Column::Id)
            .all(&self.db)
            .await?;
        into_records(models)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(stored_file::Entity::find().count(&self.db).await?)
    }

    async fn find_matching(
        &self,
        filter: Option<&str>,
        show_inactive: bool,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let models = stored_file::Entity::find()
            .filter(matching_condition(filter, show_inactive))
            .order_by_asc(stored_file::Column::Filename)
            .all(&self.db)
            .await?;
        into_records(models)
    }

    async fn count_matching(
        &self,
        filter: Option<&str>,
        show_inactive: bool,
    ) -> Result<u64, RepositoryError> {
        Ok(stored_file::Entity::find()
            .filter(matching_condition(filter, show_inactive))
            .count(&self.db)
            .await?)
    }
}
