use common::storage::StorageError;
use converter::ConversionError;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ContentSlot;

/// Failures of the file record repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A stored row could not be mapped back onto a record.
    #[error("Corrupt stored file row {id}: {message}")]
    Corrupt { id: Uuid, message: String },
}

/// Coarse error categories reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    EntityNotFound,
    ContentMissing,
    ConversionFailure,
    StoreFailure,
}

/// Errors surfaced by the content lifecycle operations.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Stored file not found: {0}")]
    EntityNotFound(Uuid),

    #[error("Missing {slot} content for stored file {id}")]
    ContentMissing { id: Uuid, slot: ContentSlot },

    /// The record was updated or deleted between being read and written.
    #[error("Stored file {0} was modified concurrently")]
    Conflict(Uuid),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Blob store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ContentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EntityNotFound(_) => ErrorKind::EntityNotFound,
            Self::ContentMissing { .. } => ErrorKind::ContentMissing,
            Self::Conversion(_) => ErrorKind::ConversionFailure,
            Self::Conflict(_) | Self::Storage(_) | Self::Repository(_) => {
                ErrorKind::StoreFailure
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;
