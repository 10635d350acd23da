pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod service;

pub use error::{ContentError, ErrorKind, RepositoryError};
pub use models::{ContentSelector, ContentSlot, FileContent, FileRecord, LoadedFile};
pub use repository::{DbFileRecordRepository, FileRecordRepository, MemoryFileRecordRepository};
pub use scheduler::{ConversionScheduler, TickOutcome, TickReport};
pub use service::{ResaveReport, ResourceService};
