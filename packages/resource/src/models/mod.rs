pub mod stored_file;

pub use stored_file::{Audit, ContentSelector, ContentSlot, FileContent, FileRecord, LoadedFile};
