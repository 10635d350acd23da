use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use common::ConversionStatus;
use common::storage::{BlobRef, Checksum};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata of a stored binary document.
///
/// Payloads never live here, only references into the blob store.
/// `checksum` is set if and only if `content_ref` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Assigned on first save.
    pub id: Option<Uuid>,
    pub filename: String,
    pub mime_type: String,
    pub filesize: i64,

    /// Working content.
    pub content_ref: Option<BlobRef>,
    /// Secondary copy of the content as first received.
    pub original_content_ref: Option<BlobRef>,
    /// PDF rendition. Only meaningful while `conversion_status` is `Converted`.
    pub converted_content_ref: Option<BlobRef>,

    /// MD5 of the payload behind `content_ref`.
    pub checksum: Option<Checksum>,
    pub conversion_status: ConversionStatus,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Owning business entity; a relation, not ownership.
    pub related_object_id: Option<String>,
    pub related_object_class: Option<String>,

    #[serde(flatten)]
    pub audit: Audit,
    pub is_active: bool,
}

/// Audit trail. Identities come from the calling layer; timestamps and
/// version are stamped by the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub created_by: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub modified: Option<DateTime<Utc>>,
    pub version: Option<i64>,
}

impl FileRecord {
    /// A new, unsaved record.
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            mime_type: mime_type.into(),
            filesize: 0,
            content_ref: None,
            original_content_ref: None,
            converted_content_ref: None,
            checksum: None,
            conversion_status: ConversionStatus::default(),
            metadata: HashMap::new(),
            related_object_id: None,
            related_object_class: None,
            audit: Audit::default(),
            is_active: true,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn related_to(mut self, class: impl Into<String>, id: impl Into<String>) -> Self {
        self.related_object_class = Some(class.into());
        self.related_object_id = Some(id.into());
        self
    }

    pub fn slot_ref(&self, slot: ContentSlot) -> Option<BlobRef> {
        match slot {
            ContentSlot::Content => self.content_ref,
            ContentSlot::Original => self.original_content_ref,
            ContentSlot::Converted => self.converted_content_ref,
        }
    }

    /// Every blob reference currently set on the record.
    pub fn blob_refs(&self) -> Vec<BlobRef> {
        ContentSlot::ALL
            .iter()
            .filter_map(|slot| self.slot_ref(*slot))
            .collect()
    }
}

/// One of the three binary slots of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSlot {
    Content,
    Original,
    Converted,
}

impl ContentSlot {
    pub const ALL: &'static [ContentSlot] = &[Self::Content, Self::Original, Self::Converted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Original => "original",
            Self::Converted => "converted",
        }
    }
}

impl fmt::Display for ContentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which payloads `get_by_id` resolves from the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentSelector {
    /// Working, original and converted payloads.
    #[default]
    Full,
    /// No payloads at all.
    MetadataOnly,
    /// Only the PDF rendition.
    ConvertedOnly,
}

/// Payloads handed to `save` alongside the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContent {
    pub content: Option<Vec<u8>>,
    /// Explicit original bytes. When absent, freshly written content doubles
    /// as the original.
    pub original: Option<Vec<u8>>,
    /// A previously computed PDF carried over on re-save. Only stored while
    /// the record stays `Converted`.
    pub converted: Option<Vec<u8>>,
}

impl FileContent {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_original(mut self, original: impl Into<Vec<u8>>) -> Self {
        self.original = Some(original.into());
        self
    }

    pub fn with_converted(mut self, converted: impl Into<Vec<u8>>) -> Self {
        self.converted = Some(converted.into());
        self
    }
}

/// A record plus whatever payloads the selector asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedFile {
    #[serde(flatten)]
    pub record: FileRecord,
    pub content: Option<Vec<u8>>,
    pub original_content: Option<Vec<u8>>,
    pub converted_content: Option<Vec<u8>>,
}
