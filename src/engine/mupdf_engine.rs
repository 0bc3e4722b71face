//! MuPDF engine
//!
//! MuPDF documents are not thread-safe, so a document handle here only keeps
//! the source bytes. Every operation opens a fresh MuPDF document on a
//! blocking thread, with access serialized per document by a
//! `parking_lot::Mutex`.

use std::sync::Arc;

use async_trait::async_trait;
use mupdf::{Colorspace, Matrix, MetadataName, TextPageOptions};
use parking_lot::Mutex;

use super::traits::{EngineDocument, EnginePage, PdfEngine};
use super::types::{DocumentMetadata, RasterImage, TextContent, TextItem, Viewport};
use crate::error::{PdfError, Result};

const PDF_MIME: &str = "application/pdf";

/// Single empty page, opened once at bootstrap to prove the engine works
const PROBE_PDF: &[u8] = b"%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj
3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << >> >>
endobj
4 0 obj
<< /Length 0 >>
stream
endstream
endobj
xref
0 5
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000226 00000 n
trailer
<< /Size 5 /Root 1 0 R >>
startxref
276
%%EOF";

/// MuPDF-backed engine
#[derive(Debug, Clone, Copy)]
pub struct MupdfEngine;

impl MupdfEngine {
    /// Bootstrap MuPDF by opening the probe document on a blocking thread.
    pub async fn initialize() -> Result<Self> {
        tokio::task::spawn_blocking(|| {
            let doc = mupdf::Document::from_bytes(PROBE_PDF, PDF_MIME)
                .map_err(|e| PdfError::EngineInit(e.to_string()))?;
            let pages = doc
                .page_count()
                .map_err(|e| PdfError::EngineInit(e.to_string()))?;

            tracing::debug!("MuPDF probe document opened with {} page(s)", pages);

            Ok(Self)
        })
        .await
        .map_err(|e| PdfError::EngineInit(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl PdfEngine for MupdfEngine {
    fn name(&self) -> &'static str {
        "mupdf"
    }

    async fn open_document(&self, data: Vec<u8>) -> Result<Arc<dyn EngineDocument>> {
        let doc = tokio::task::spawn_blocking(move || MupdfDocument::from_bytes(data)).await??;
        Ok(Arc::new(doc))
    }
}

/// Source bytes of one parsed document
#[derive(Clone)]
pub(crate) struct MupdfDocument {
    inner: Arc<MupdfDocumentInner>,
}

struct MupdfDocumentInner {
    data: Vec<u8>,
    page_count: u32,
    lock: Mutex<()>,
}

impl MupdfDocument {
    fn from_bytes(data: Vec<u8>) -> Result<Self> {
        // Validate the document can be opened and cache its page count
        let doc =
            mupdf::Document::from_bytes(&data, PDF_MIME).map_err(|e| PdfError::Parse(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| PdfError::Parse(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(MupdfDocumentInner {
                data,
                page_count: page_count.max(0) as u32,
                lock: Mutex::new(()),
            }),
        })
    }

    /// Open a fresh MuPDF document and run `f` against it
    fn with_doc<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mupdf::Document) -> Result<R>,
    {
        let _guard = self.inner.lock.lock();
        let doc = mupdf::Document::from_bytes(&self.inner.data, PDF_MIME)?;
        f(&doc)
    }

    /// Run `f` on a blocking thread against a fresh document
    async fn with_doc_blocking<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mupdf::Document) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let doc = self.clone();
        tokio::task::spawn_blocking(move || doc.with_doc(f)).await?
    }
}

fn format_version(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    let version = trimmed.strip_prefix("PDF").unwrap_or(trimmed).trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

#[async_trait]
impl EngineDocument for MupdfDocument {
    fn page_count(&self) -> u32 {
        self.inner.page_count
    }

    async fn metadata(&self) -> Result<DocumentMetadata> {
        self.with_doc_blocking(|doc| {
            let get_meta = |name: MetadataName| -> Option<String> {
                doc.metadata(name).ok().filter(|s| !s.is_empty())
            };

            Ok(DocumentMetadata {
                format_version: get_meta(MetadataName::Format).and_then(format_version),
                title: get_meta(MetadataName::Title),
                author: get_meta(MetadataName::Author),
                subject: get_meta(MetadataName::Subject),
                keywords: get_meta(MetadataName::Keywords),
                creator: get_meta(MetadataName::Creator),
                producer: get_meta(MetadataName::Producer),
                creation_date: get_meta(MetadataName::CreationDate),
                modification_date: get_meta(MetadataName::ModDate),
            })
        })
        .await
        .map_err(|e| match e {
            PdfError::Engine(msg) => PdfError::Metadata(msg),
            other => other,
        })
    }

    async fn page(&self, page_no: u32) -> Result<Arc<dyn EnginePage>> {
        if page_no == 0 || page_no > self.inner.page_count {
            return Err(PdfError::InvalidPage {
                page_no,
                page_count: self.inner.page_count,
            });
        }

        let index = (page_no - 1) as i32;
        let (width, height) = self
            .with_doc_blocking(move |doc| {
                let page = doc.load_page(index)?;
                let bounds = page.bounds()?;
                Ok((bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
            })
            .await
            .map_err(|e| PdfError::PageLoad(e.to_string()))?;

        Ok(Arc::new(MupdfPage {
            doc: self.clone(),
            page_no,
            width,
            height,
        }))
    }
}

/// One page of a MuPDF document
struct MupdfPage {
    doc: MupdfDocument,
    page_no: u32,
    /// Width in points
    width: f32,
    /// Height in points
    height: f32,
}

impl MupdfPage {
    fn index(&self) -> i32 {
        (self.page_no - 1) as i32
    }
}

#[async_trait]
impl EnginePage for MupdfPage {
    fn page_no(&self) -> u32 {
        self.page_no
    }

    async fn text_content(&self) -> Result<TextContent> {
        let index = self.index();

        self.doc
            .with_doc_blocking(move |doc| {
                let page = doc.load_page(index)?;
                let text_page = page.to_text_page(TextPageOptions::empty())?;

                let mut items = Vec::new();
                for block in text_page.blocks() {
                    for line in block.lines() {
                        let text: String = line.chars().filter_map(|ch| ch.char()).collect();
                        if text.is_empty() {
                            continue;
                        }

                        let bounds = line.bounds();
                        items.push(TextItem {
                            text,
                            x: bounds.x0,
                            y: bounds.y0,
                            width: bounds.x1 - bounds.x0,
                            height: bounds.y1 - bounds.y0,
                        });
                    }
                }

                Ok(TextContent { items })
            })
            .await
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    async fn viewport(&self, scale: f32) -> Result<Viewport> {
        Ok(Viewport::from_points(self.width, self.height, scale))
    }

    async fn render(&self, viewport: &Viewport) -> Result<RasterImage> {
        let index = self.index();
        let scale = viewport.scale;

        self.doc
            .with_doc_blocking(move |doc| {
                let page = doc.load_page(index)?;

                // Opaque white background, like a freshly cleared canvas
                let matrix = Matrix::new_scale(scale, scale);
                let colorspace = Colorspace::device_rgb();
                let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;

                RasterImage::from_samples(
                    pixmap.width() as u32,
                    pixmap.height() as u32,
                    pixmap.n() as usize,
                    pixmap.samples(),
                )
            })
            .await
            .map_err(|e| match e {
                PdfError::Engine(msg) => PdfError::Render(msg),
                other => other,
            })
    }
}
