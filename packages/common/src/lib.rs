pub mod config;
pub mod conversion_status;
pub mod storage;

pub use conversion_status::ConversionStatus;
