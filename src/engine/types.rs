//! Engine data types

use serde::{Deserialize, Serialize};

use crate::error::{PdfError, Result};

/// Document information dictionary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// PDF version from the header, e.g. "1.7"
    pub format_version: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    /// Application that created the original document
    pub creator: Option<String>,
    /// Application that produced the PDF
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Text runs of one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub items: Vec<TextItem>,
}

/// A single text run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    /// The text content, as reported by the engine
    pub text: String,
    /// X position (points from left)
    pub x: f32,
    /// Y position (points from top)
    pub y: f32,
    /// Width in points
    pub width: f32,
    /// Height in points
    pub height: f32,
}

impl TextItem {
    /// A run without position information
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

/// Page size at a given scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
    /// Scale factor (1.0 = 72 DPI)
    pub scale: f32,
}

impl Viewport {
    /// Viewport for a page of `width` x `height` points at `scale`
    pub fn from_points(width: f32, height: f32, scale: f32) -> Self {
        Self {
            width: width * scale,
            height: height * scale,
            scale,
        }
    }

    /// Pixel dimensions of a raster surface covering the viewport
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.ceil().max(1.0) as u32,
            self.height.ceil().max(1.0) as u32,
        )
    }
}

/// RGBA8 pixel buffer produced by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA samples, 4 bytes per pixel
    pub pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(PdfError::Image(format!(
                "raster buffer holds {} bytes, expected {} for {}x{} RGBA",
                pixels.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Convert packed samples with `n` components per pixel (3 = RGB, 4 = RGBA)
    pub fn from_samples(width: u32, height: u32, n: usize, samples: &[u8]) -> Result<Self> {
        let pixel_count = width as usize * height as usize;
        if n < 3 || samples.len() < pixel_count * n {
            return Err(PdfError::Image(format!(
                "{} samples with {} components cannot cover {}x{}",
                samples.len(),
                n,
                width,
                height
            )));
        }

        let rgba = samples
            .chunks_exact(n)
            .take(pixel_count)
            .flat_map(|px| [px[0], px[1], px[2], if n >= 4 { px[3] } else { 255 }])
            .collect();

        Self::new(width, height, rgba)
    }
}
