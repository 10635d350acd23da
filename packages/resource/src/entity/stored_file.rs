use common::ConversionStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stored_file")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub filename: String,
    pub mime_type: String,
    pub filesize: i64,

    /// Blob references, 32 hex chars each.
    pub content_ref: Option<String>,
    pub original_content_ref: Option<String>,
    pub converted_content_ref: Option<String>,

    /// Hex MD5 of the working content.
    pub checksum: Option<String>,

    pub conversion_status: ConversionStatus,

    /// Free-form string map, stored as a JSON object.
    #[sea_orm(column_type = "Json")]
    pub metadata: Json,

    pub related_object_id: Option<String>,
    pub related_object_class: Option<String>,

    pub created_by: Option<String>,
    pub created_at: DateTimeUtc,
    pub modified_by: Option<String>,
    pub modified_at: DateTimeUtc,
    pub version: i64,
    pub is_active: bool,
}

impl ActiveModelBehavior for ActiveModel {}
