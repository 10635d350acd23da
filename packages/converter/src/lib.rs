//! External PDF rendition of documents.
//!
//! Conversion is delegated to an out-of-process renderer; this crate only
//! stages bytes, runs the process under a time bound and collects its output.

mod error;
pub mod process;

use async_trait::async_trait;

pub use error::ConversionError;
pub use process::ProcessConverter;

/// Turns a document payload into PDF bytes.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input`, whose original name was `original_filename`.
    ///
    /// The filename is only used for its extension, which most renderers
    /// rely on to pick an import filter.
    async fn convert(
        &self,
        input: &[u8],
        original_filename: &str,
    ) -> Result<Vec<u8>, ConversionError>;
}

/// Replace the extension of `filename` with `.pdf`, appending it when there is none.
pub fn pdf_file_name(filename: &str) -> String {
    match filename.rfind('.') {
        Some(i) => format!("{}.pdf", &filename[..i]),
        None => format!("{filename}.pdf"),
    }
}
