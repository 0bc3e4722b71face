//! Engine traits
//!
//! Object-safe interfaces over a PDF engine. Handles are shared as
//! `Arc<dyn ...>` so documents and pages can hold them across tasks.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{DocumentMetadata, RasterImage, TextContent, Viewport};
use crate::error::Result;

/// A bootstrapped PDF engine
#[async_trait]
pub trait PdfEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Parse raw file bytes into a document handle
    async fn open_document(&self, data: Vec<u8>) -> Result<Arc<dyn EngineDocument>>;
}

/// A parsed document
#[async_trait]
pub trait EngineDocument: Send + Sync {
    /// Total number of pages reported by the engine
    fn page_count(&self) -> u32;

    /// Document information dictionary
    async fn metadata(&self) -> Result<DocumentMetadata>;

    /// Load the handle for a 1-based page number
    async fn page(&self, page_no: u32) -> Result<Arc<dyn EnginePage>>;
}

/// A loaded page
#[async_trait]
pub trait EnginePage: Send + Sync {
    /// 1-based page number
    fn page_no(&self) -> u32;

    /// Text runs in content order
    async fn text_content(&self) -> Result<TextContent>;

    /// Page size at `scale` (1.0 = 72 DPI)
    async fn viewport(&self, scale: f32) -> Result<Viewport>;

    /// Rasterize the page into an RGBA buffer sized by `viewport`
    async fn render(&self, viewport: &Viewport) -> Result<RasterImage>;
}
