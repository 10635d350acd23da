use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checksum::Checksum;
use super::error::StorageError;

/// Opaque reference to a stored blob.
///
/// Rendered as 32 lowercase hex characters (a UUIDv7 without dashes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobRef(Uuid);

impl BlobRef {
    /// Allocate a fresh, time-ordered reference.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(s: &str) -> Result<Self, StorageError> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidRef(format!(
                "expected 32 hex characters, got '{s}'"
            )));
        }
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|e| StorageError::InvalidRef(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }

    /// First 2 hex characters (shard directory for filesystem layout).
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0.as_bytes()[..1])
    }

    /// Remaining 30 hex characters (filename within shard).
    pub fn shard_suffix(&self) -> String {
        hex::encode(&self.0.as_bytes()[1..])
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({})", self.to_hex())
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for BlobRef {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BlobRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlobRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Descriptive information supplied with a `put`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    /// Suggested name, e.g. `"{id}-report.docx"`.
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl BlobInfo {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Everything a store knows about a blob besides its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    pub blob_ref: BlobRef,
    #[serde(flatten)]
    pub info: BlobInfo,
    pub size: u64,
    pub checksum: Checksum,
    pub created_at: DateTime<Utc>,
}
