//! Error types for docweave.

use thiserror::Error;

/// Result type alias for docweave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while assembling or rendering a document.
#[derive(Error, Debug)]
pub enum Error {
    /// A polygon was constructed from malformed corners.
    #[error("Invalid polygon: {0}")]
    Geometry(String),

    /// A block id does not resolve inside the page it was used on.
    #[error("Unresolved block address: {0}")]
    Address(String),

    /// Page index is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// An external model raised or returned malformed data.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    /// Error during rendering (HTML, Markdown, JSON).
    #[error("Rendering error: {0}")]
    Render(String),

    /// Error cropping or encoding a page image.
    #[error("Image error: {0}")]
    Image(String),

    /// Error raised by the enrichment runner.
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Render(format!("JSON serialization error: {}", err))
    }
}
