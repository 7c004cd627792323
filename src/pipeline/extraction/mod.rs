pub mod types;
pub mod pdfium;
pub mod pdf;
pub mod lattice;
pub mod stream;
pub mod text_split;
pub mod cascade;

pub use types::*;
pub use cascade::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A strategy's backing library is missing from this deployment.
    #[error("Extraction strategy unavailable: {0}")]
    Unavailable(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF is encrypted")]
    PdfEncrypted,

    #[error("PDF has no pages")]
    EmptyDocument,
}
