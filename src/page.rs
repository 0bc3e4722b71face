//! PDF pages
//!
//! A page loads its engine handle and text in a spawned task as soon as it
//! is constructed. Once loaded, the page text is searchable and the page can
//! be rendered to PNG.

use std::fmt;
use std::sync::{Arc, OnceLock};

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use regex::Regex;

use crate::config::Config;
use crate::engine::{EngineDocument, EnginePage, RasterImage, TextContent, Viewport};
use crate::error::{PdfError, Result};
use crate::provider::PdfProvider;
use crate::readiness::Readiness;

/// Everything a page needs to load itself
#[derive(Clone)]
pub struct PageOptions {
    pub provider: PdfProvider,
    pub document: Arc<dyn EngineDocument>,
    /// 1-based page number
    pub page_no: u32,
}

/// Rendering options for `PdfPage::as_png`
#[derive(Debug, Clone, Copy, Default)]
pub struct PngOptions {
    /// Scale factor (1.0 = 72 DPI). `None` or zero means the configured default.
    pub scale: Option<f32>,
}

impl PngOptions {
    pub fn scale(scale: f32) -> Self {
        Self { scale: Some(scale) }
    }
}

#[derive(Clone)]
pub struct PdfPage {
    inner: Arc<PageInner>,
}

struct PageInner {
    provider: PdfProvider,
    page_no: u32,
    loaded: Arc<LoadedPage>,
    loading: Readiness,
}

/// Written once by the loading task
#[derive(Default)]
struct LoadedPage {
    handle: OnceLock<Arc<dyn EnginePage>>,
    text: OnceLock<String>,
}

impl PdfPage {
    /// Validate the page number and start loading the page.
    ///
    /// Fails immediately with `InvalidPage` when `page_no` is zero or beyond
    /// the document's page count.
    pub fn new(options: PageOptions) -> Result<Self> {
        let PageOptions {
            provider,
            document,
            page_no,
        } = options;

        let page_count = document.page_count();
        if page_no == 0 || page_no > page_count {
            return Err(PdfError::InvalidPage {
                page_no,
                page_count,
            });
        }

        let loaded = Arc::new(LoadedPage::default());

        let target = loaded.clone();
        let loading = Readiness::spawn(async move {
            let handle = document.page(page_no).await?;
            // Stored before the text so a page with broken text can still render
            let _ = target.handle.set(handle.clone());

            let content = handle.text_content().await?;
            let _ = target.text.set(items_to_text(&content));

            tracing::debug!("Loaded page {}", page_no);
            Ok(())
        });

        Ok(Self {
            inner: Arc::new(PageInner {
                provider,
                page_no,
                loaded,
                loading,
            }),
        })
    }

    /// Construct a page and wait for it to finish loading.
    pub async fn load(options: PageOptions) -> Result<Self> {
        let page = Self::new(options)?;
        page.wait_for_load().await?;
        Ok(page)
    }

    pub async fn wait_for_load(&self) -> Result<()> {
        self.inner.loading.wait().await
    }

    /// First match of `regexp` in the page text
    pub fn search(&self, regexp: &Regex) -> Option<String> {
        regexp
            .find(self.text())
            .map(|found| found.as_str().to_string())
    }

    /// Case-insensitive containment check.
    ///
    /// Spaces and line breaks are removed from `search_string` first, the same
    /// way they were removed from the page text.
    pub fn includes(&self, search_string: &str) -> bool {
        let needle = strip_whitespace(search_string).to_uppercase();
        self.text().to_uppercase().contains(&needle)
    }

    /// Render the page and encode it as PNG.
    pub async fn as_png(&self, options: PngOptions) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        let config = self.inner.provider.config();
        let scale = resolve_scale(config, options.scale)?;
        let compression: CompressionType = config.render.png_compression.into();

        let viewport = handle.viewport(scale).await?;
        let raster = handle.render(&viewport).await?;

        tracing::debug!(
            "Encoding page {} at scale {} ({}x{})",
            self.inner.page_no,
            scale,
            raster.width,
            raster.height
        );

        tokio::task::spawn_blocking(move || encode_png(&raster, compression)).await?
    }

    /// Page size at `scale`, with the same defaulting rules as `as_png`
    pub async fn viewport(&self, scale: Option<f32>) -> Result<Viewport> {
        let handle = self.handle()?;
        let scale = resolve_scale(self.inner.provider.config(), scale)?;
        handle.viewport(scale).await
    }

    /// Page text with spaces and line breaks removed. Empty until loaded.
    pub fn text(&self) -> &str {
        self.inner
            .loaded
            .text
            .get()
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn page_no(&self) -> u32 {
        self.inner.page_no
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loading.is_ready()
    }

    fn handle(&self) -> Result<Arc<dyn EnginePage>> {
        self.inner
            .loaded
            .handle
            .get()
            .cloned()
            .ok_or_else(|| PdfError::NotReady(format!("Page #{}", self.inner.page_no)))
    }
}

impl fmt::Debug for PdfPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfPage")
            .field("page_no", &self.inner.page_no)
            .field("text_len", &self.text().len())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

// Helper functions

/// Remove spaces, carriage returns and line feeds. Other whitespace is kept.
pub(crate) fn strip_whitespace(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, ' ' | '\r' | '\n'))
        .collect()
}

fn items_to_text(content: &TextContent) -> String {
    content
        .items
        .iter()
        .map(|item| strip_whitespace(&item.text))
        .collect()
}

fn resolve_scale(config: &Config, requested: Option<f32>) -> Result<f32> {
    let scale = match requested {
        None => return Ok(config.render.default_scale),
        Some(scale) if scale == 0.0 => return Ok(config.render.default_scale),
        Some(scale) => scale,
    };

    if !scale.is_finite() || scale < 0.0 {
        return Err(PdfError::InvalidScale(scale));
    }
    if let Some(max) = config.render.max_scale {
        if scale > max {
            return Err(PdfError::InvalidScale(scale));
        }
    }

    Ok(scale)
}

fn encode_png(raster: &RasterImage, compression: CompressionType) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive).write_image(
        &raster.pixels,
        raster.width,
        raster.height,
        ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}
