mod blob_ref;
mod checksum;
mod error;
mod traits;

pub mod filesystem;
pub mod memory;

pub use blob_ref::{BlobInfo, BlobRef, StoredBlob};
pub use checksum::Checksum;
pub use error::StorageError;
pub use traits::{BlobStore, BoxReader};
