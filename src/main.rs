//! PDF Sift
//!
//! Loads a PDF, finds the pages whose text matches a pattern and writes each
//! of them out as a PNG.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use regex::Regex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_sift::{Config, DocumentOptions, PdfDocument, PdfPage, PdfProvider, PngOptions};

#[derive(Parser, Debug)]
#[command(name = "pdf-sift", version, about = "Search PDF pages by regex and export matches as PNG")]
struct Args {
    /// PDF file to load
    file: PathBuf,

    /// Regular expression matched against page text (spaces and line breaks removed)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Name output files after the matched text instead of the page number
    #[arg(long)]
    by_match: bool,

    /// Directory PNG files are written to
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Render scale (1.0 = 72 DPI)
    #[arg(short, long)]
    scale: Option<f32>,

    /// When a matched page contains this phrase, also export the page after it
    #[arg(long)]
    follow: Option<String>,

    /// Print document info as JSON
    #[arg(long)]
    info: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_sift=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let provider = PdfProvider::build_with_config(config)
        .await
        .context("Failed to initialize PDF engine")?;

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let document = provider
        .load_document(DocumentOptions::new(bytes))
        .await
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    for error in document.errors() {
        tracing::warn!("{}", error);
    }

    if args.info {
        let info = document.info()?;
        println!("{}", serde_json::to_string_pretty(&info)?);
    }

    let Some(pattern) = &args.pattern else {
        return Ok(());
    };
    let regexp = Regex::new(pattern).with_context(|| format!("Invalid pattern '{}'", pattern))?;

    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    let export = Export {
        out: &args.out,
        png: PngOptions { scale: args.scale },
        follow: args.follow.as_deref(),
    };

    let written = if args.by_match {
        let mut written = 0;
        for (key, page) in document.apply_filter_indexed(&regexp) {
            written += export.write(&document, &file_key(&key), &page).await?;
        }
        written
    } else {
        let mut written = 0;
        for (page_no, page) in document.apply_filter(&regexp) {
            written += export.write(&document, &page_no.to_string(), &page).await?;
        }
        written
    };

    tracing::info!("Wrote {} PNG file(s) to {}", written, args.out.display());
    Ok(())
}

struct Export<'a> {
    out: &'a Path,
    png: PngOptions,
    follow: Option<&'a str>,
}

impl Export<'_> {
    /// Write `<key>.png`, plus `<key>_page_2.png` for the following page when
    /// the matched page contains the follow phrase. Returns the files written.
    async fn write(
        &self,
        document: &PdfDocument,
        key: &str,
        page: &PdfPage,
    ) -> anyhow::Result<usize> {
        self.write_page(page, &format!("{}.png", key)).await?;

        let Some(phrase) = self.follow else {
            return Ok(1);
        };
        if !page.includes(phrase) {
            return Ok(1);
        }

        match document.page(page.page_no() + 1) {
            Some(next) => {
                self.write_page(&next, &format!("{}_page_2.png", key)).await?;
                Ok(2)
            }
            None => {
                tracing::warn!(
                    "Page {} contains '{}' but page {} is not available",
                    page.page_no(),
                    phrase,
                    page.page_no() + 1
                );
                Ok(1)
            }
        }
    }

    async fn write_page(&self, page: &PdfPage, name: &str) -> anyhow::Result<()> {
        let png = page
            .as_png(self.png)
            .await
            .with_context(|| format!("Failed to render page {}", page.page_no()))?;

        let path = self.out.join(name);
        tokio::fs::write(&path, &png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Wrote page {} to {}", page.page_no(), path.display());
        Ok(())
    }
}

/// Matched text made safe to use as a file name
fn file_key(matched: &str) -> String {
    matched
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}
