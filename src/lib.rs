//! PDF Sift Library
//!
//! Loads PDF documents through a shared engine provider, searches the text
//! of every page with regular expressions, and renders selected pages to PNG.
//!
//! # Modules
//!
//! - `provider`: Engine bootstrap shared by every document
//! - `document`: Document loading, page bookkeeping and filtering
//! - `page`: Page text, search and PNG rendering
//! - `engine`: Engine abstraction (MuPDF, in-memory fixtures)
//!
//! # Example
//!
//! ```no_run
//! use pdf_sift::{DocumentOptions, PdfProvider, PngOptions};
//! use regex::Regex;
//!
//! # async fn run() -> pdf_sift::Result<()> {
//! let provider = PdfProvider::build().await?;
//! let bytes = std::fs::read("statement.pdf").unwrap();
//! let document = provider.load_document(DocumentOptions::new(bytes)).await?;
//!
//! let invoice = Regex::new(r"InvoiceNo:(\d+)").unwrap();
//! for (page_no, page) in document.apply_filter(&invoice) {
//!     let png = page.as_png(PngOptions::default()).await?;
//!     println!("page {}: {} bytes", page_no, png.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod page;
pub mod provider;

mod readiness;

pub use config::Config;
pub use document::{DocumentInfo, DocumentOptions, PdfDocument};
pub use error::{PdfError, Result};
pub use page::{PageOptions, PdfPage, PngOptions};
pub use provider::PdfProvider;
