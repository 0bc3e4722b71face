//! Configuration management
//!
//! All settings have defaults; `Config::from_env` overrides them from
//! `PDF_SIFT_*` environment variables.

use std::env;

use image::codecs::png::CompressionType;
use serde::Deserialize;

use crate::error::{PdfError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub load: LoadConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    /// Pages loaded at once while a document loads (1 = strictly sequential).
    ///
    /// Only engines that can serve pages in parallel benefit. The MuPDF engine
    /// serializes every operation on a document behind one lock and reopens
    /// the document for each call, so values above 1 overlap nothing there and
    /// a full load still costs 2N+1 document opens.
    pub page_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Scale used when a caller passes none (or zero)
    pub default_scale: f32,
    /// Upper bound on accepted scales, unlimited when unset
    pub max_scale: Option<f32>,
    /// PNG compression applied to every encoded page
    pub png_compression: PngCompression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    #[default]
    Fast,
    Default,
    Best,
}

impl PngCompression {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "default" => Ok(Self::Default),
            "best" => Ok(Self::Best),
            other => Err(PdfError::Config(format!(
                "unknown PNG compression '{}' (expected fast, default or best)",
                other
            ))),
        }
    }
}

impl From<PngCompression> for CompressionType {
    fn from(value: PngCompression) -> Self {
        match value {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            load: LoadConfig {
                page_concurrency: 1,
            },
            render: RenderConfig {
                default_scale: 1.0,
                max_scale: None,
                png_compression: PngCompression::Fast,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let config = Config {
            load: LoadConfig {
                page_concurrency: match env::var("PDF_SIFT_PAGE_CONCURRENCY") {
                    Ok(v) => parse_number("PDF_SIFT_PAGE_CONCURRENCY", &v)?,
                    Err(_) => defaults.load.page_concurrency,
                },
            },
            render: RenderConfig {
                default_scale: match env::var("PDF_SIFT_DEFAULT_SCALE") {
                    Ok(v) => parse_number("PDF_SIFT_DEFAULT_SCALE", &v)?,
                    Err(_) => defaults.render.default_scale,
                },
                max_scale: match env::var("PDF_SIFT_MAX_SCALE") {
                    Ok(v) => Some(parse_number("PDF_SIFT_MAX_SCALE", &v)?),
                    Err(_) => defaults.render.max_scale,
                },
                png_compression: match env::var("PDF_SIFT_PNG_COMPRESSION") {
                    Ok(v) => PngCompression::parse(&v)?,
                    Err(_) => defaults.render.png_compression,
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.load.page_concurrency == 0 {
            return Err(PdfError::Config(
                "page_concurrency must be at least 1".to_string(),
            ));
        }
        if !(self.render.default_scale.is_finite() && self.render.default_scale > 0.0) {
            return Err(PdfError::Config(format!(
                "default_scale must be a positive number, got {}",
                self.render.default_scale
            )));
        }
        if let Some(max) = self.render.max_scale {
            if !(max.is_finite() && max >= self.render.default_scale) {
                return Err(PdfError::Config(format!(
                    "max_scale must be at least default_scale ({}), got {}",
                    self.render.default_scale, max
                )));
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PdfError::Config(format!("{} has an invalid value: '{}'", name, value)))
}
