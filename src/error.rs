//! Error types
//!
//! A single error type for engine, document and page operations.
//! Payloads are strings so the error is `Clone`: one failed readiness
//! signal is observed by every waiter.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Clone, Error)]
pub enum PdfError {
    /// Engine bootstrap failed
    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    /// Object used before its readiness signal resolved
    #[error("{0} is not ready")]
    NotReady(String),

    /// Error raised by the underlying engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// Failed to parse document bytes
    #[error("Parse error: {0}")]
    Parse(String),

    /// Failed to read document metadata
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Page number outside 1..=page_count
    #[error("Invalid Page #{page_no} - Total # of pages is {page_count}")]
    InvalidPage { page_no: u32, page_count: u32 },

    /// Failed to load an engine page handle
    #[error("Page load error: {0}")]
    PageLoad(String),

    /// Failed to fetch page text content
    #[error("Text extraction error: {0}")]
    TextExtraction(String),

    /// Failed to rasterize a page
    #[error("Render error: {0}")]
    Render(String),

    /// Render scale rejected
    #[error("Invalid scale: {0}")]
    InvalidScale(f32),

    /// Image buffer or encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Background task panicked or was aborted
    #[error("Task join error: {0}")]
    TaskJoin(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, PdfError>;

impl From<mupdf::Error> for PdfError {
    fn from(err: mupdf::Error) -> Self {
        PdfError::Engine(err.to_string())
    }
}

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::Image(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PdfError {
    fn from(err: tokio::task::JoinError) -> Self {
        PdfError::TaskJoin(err.to_string())
    }
}
