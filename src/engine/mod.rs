//! PDF engine abstraction
//!
//! Parsing, text extraction and rasterization are delegated to an engine.
//! This crate only sequences engine calls; it never reads the PDF format
//! itself.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   open_document   ┌────────────────┐   page(n)   ┌──────────────┐
//! │  PdfEngine   │ ────────────────▶ │ EngineDocument │ ──────────▶ │  EnginePage  │
//! └──────────────┘                   └────────────────┘             └──────────────┘
//!                                      page_count()                   text_content()
//!                                      metadata()                     viewport(scale)
//!                                                                     render(viewport)
//! ```
//!
//! - [`MupdfEngine`]: production engine backed by MuPDF
//! - [`MemoryEngine`]: pre-extracted pages held in memory (tests, benchmarks)

mod memory;
mod mupdf_engine;
mod traits;
mod types;

pub use memory::{MemoryDocument, MemoryEngine, MemoryEngineStats, MemoryPage};
pub use mupdf_engine::MupdfEngine;
pub use traits::{EngineDocument, EnginePage, PdfEngine};
pub use types::{DocumentMetadata, RasterImage, TextContent, TextItem, Viewport};
