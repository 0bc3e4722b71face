//! In-memory engine
//!
//! Serves pages whose text was extracted ahead of time. Used for tests and
//! benchmarks, and anywhere a fixture stands in for a real PDF. A page can be
//! marked as failing so partial-load behaviour can be exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::traits::{EngineDocument, EnginePage, PdfEngine};
use super::types::{DocumentMetadata, RasterImage, TextContent, TextItem, Viewport};
use crate::error::{PdfError, Result};

/// One fixture page
#[derive(Debug, Clone)]
pub struct MemoryPage {
    /// Width in points
    pub width: f32,
    /// Height in points
    pub height: f32,
    /// Text runs in content order
    pub items: Vec<String>,
    /// When set, text extraction fails with this message
    pub text_error: Option<String>,
}

impl MemoryPage {
    /// US Letter page with the given text runs
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            width: 612.0,
            height: 792.0,
            items: items.into_iter().map(Into::into).collect(),
            text_error: None,
        }
    }

    /// Page whose text extraction fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            text_error: Some(message.into()),
            ..Self::new(Vec::<String>::new())
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Fixture document served for any PDF bytes
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    pub metadata: DocumentMetadata,
    pub pages: Vec<MemoryPage>,
}

impl MemoryDocument {
    pub fn new(pages: Vec<MemoryPage>) -> Self {
        Self {
            metadata: DocumentMetadata {
                format_version: Some("1.7".to_string()),
                ..Default::default()
            },
            pages,
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Call counters, for checking that work is not repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEngineStats {
    pub documents_opened: usize,
    pub pages_loaded: usize,
    pub text_fetches: usize,
    pub renders: usize,
}

#[derive(Default)]
struct Counters {
    documents_opened: AtomicUsize,
    pages_loaded: AtomicUsize,
    text_fetches: AtomicUsize,
    renders: AtomicUsize,
}

/// Engine over a single fixture document
#[derive(Clone)]
pub struct MemoryEngine {
    fixture: Arc<MemoryDocument>,
    counters: Arc<Counters>,
}

impl MemoryEngine {
    pub fn new(fixture: MemoryDocument) -> Self {
        Self {
            fixture: Arc::new(fixture),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn stats(&self) -> MemoryEngineStats {
        MemoryEngineStats {
            documents_opened: self.counters.documents_opened.load(Ordering::Relaxed),
            pages_loaded: self.counters.pages_loaded.load(Ordering::Relaxed),
            text_fetches: self.counters.text_fetches.load(Ordering::Relaxed),
            renders: self.counters.renders.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl PdfEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open_document(&self, data: Vec<u8>) -> Result<Arc<dyn EngineDocument>> {
        // PDF magic: %PDF
        if !data.starts_with(b"%PDF") {
            return Err(PdfError::Parse("missing %PDF header".to_string()));
        }

        self.counters.documents_opened.fetch_add(1, Ordering::Relaxed);

        Ok(Arc::new(MemoryDocumentHandle {
            fixture: self.fixture.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct MemoryDocumentHandle {
    fixture: Arc<MemoryDocument>,
    counters: Arc<Counters>,
}

#[async_trait]
impl EngineDocument for MemoryDocumentHandle {
    fn page_count(&self) -> u32 {
        self.fixture.pages.len() as u32
    }

    async fn metadata(&self) -> Result<DocumentMetadata> {
        Ok(self.fixture.metadata.clone())
    }

    async fn page(&self, page_no: u32) -> Result<Arc<dyn EnginePage>> {
        let page_count = self.page_count();
        let page = page_no
            .checked_sub(1)
            .and_then(|i| self.fixture.pages.get(i as usize))
            .ok_or(PdfError::InvalidPage {
                page_no,
                page_count,
            })?;

        self.counters.pages_loaded.fetch_add(1, Ordering::Relaxed);

        Ok(Arc::new(MemoryPageHandle {
            page: page.clone(),
            page_no,
            counters: self.counters.clone(),
        }))
    }
}

struct MemoryPageHandle {
    page: MemoryPage,
    page_no: u32,
    counters: Arc<Counters>,
}

#[async_trait]
impl EnginePage for MemoryPageHandle {
    fn page_no(&self) -> u32 {
        self.page_no
    }

    async fn text_content(&self) -> Result<TextContent> {
        self.counters.text_fetches.fetch_add(1, Ordering::Relaxed);

        if let Some(message) = &self.page.text_error {
            return Err(PdfError::TextExtraction(message.clone()));
        }

        Ok(TextContent {
            items: self.page.items.iter().map(TextItem::plain).collect(),
        })
    }

    async fn viewport(&self, scale: f32) -> Result<Viewport> {
        Ok(Viewport::from_points(self.page.width, self.page.height, scale))
    }

    async fn render(&self, viewport: &Viewport) -> Result<RasterImage> {
        self.counters.renders.fetch_add(1, Ordering::Relaxed);

        let (width, height) = viewport.pixel_size();
        let mut pixels = vec![255u8; width as usize * height as usize * 4];

        // One gray band per text run, so pages with different content differ
        let band = (height as usize / (self.page.items.len() + 1)).max(1);
        for (i, item) in self.page.items.iter().enumerate() {
            let y = band * (i + 1);
            if y >= height as usize {
                break;
            }
            let shade = 255u8.saturating_sub((item.len() % 200) as u8 + 40);
            let row = &mut pixels[y * width as usize * 4..(y + 1) * width as usize * 4];
            for px in row.chunks_exact_mut(4) {
                px[0] = shade;
                px[1] = shade;
                px[2] = shade;
            }
        }

        RasterImage::new(width, height, pixels)
    }
}
