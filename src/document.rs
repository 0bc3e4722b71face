//! PDF documents
//!
//! Loading a document parses the file, reads its information dictionary and
//! then loads every page in order. Pages that fail to load are recorded in the
//! document's error list and skipped; the rest of the document stays usable.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;

use crate::engine::{DocumentMetadata, EngineDocument};
use crate::error::{PdfError, Result};
use crate::page::{PageOptions, PdfPage};
use crate::provider::PdfProvider;
use crate::readiness::Readiness;

/// Source bytes plus load options
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    /// Raw PDF file contents
    pub file_buffer: Vec<u8>,
    /// Parse the document and read its metadata, but load no pages
    pub do_not_load_pages: bool,
}

impl DocumentOptions {
    pub fn new(file_buffer: Vec<u8>) -> Self {
        Self {
            file_buffer,
            do_not_load_pages: false,
        }
    }

    pub fn without_pages(mut self) -> Self {
        self.do_not_load_pages = true;
        self
    }
}

/// Summary of a parsed document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    /// Total pages in the file, including any that failed to load
    pub no_of_pages: u32,
    pub format_version: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

#[derive(Clone)]
pub struct PdfDocument {
    inner: Arc<DocumentInner>,
}

struct DocumentInner {
    state: Arc<DocumentState>,
    loading: Readiness,
}

/// Filled in by the loading task
#[derive(Default)]
struct DocumentState {
    engine_document: OnceLock<Arc<dyn EngineDocument>>,
    metadata: OnceLock<DocumentMetadata>,
    pages: RwLock<BTreeMap<u32, PdfPage>>,
    errors: RwLock<Vec<String>>,
}

impl PdfDocument {
    /// Start loading a document through `provider`.
    ///
    /// Returns immediately; use `wait_for_load` to observe the outcome.
    pub fn new(provider: &PdfProvider, options: DocumentOptions) -> Self {
        let state = Arc::new(DocumentState::default());
        let loading = Readiness::spawn(run_load(provider.clone(), state.clone(), options));

        Self {
            inner: Arc::new(DocumentInner { state, loading }),
        }
    }

    /// Construct a document and wait for it to finish loading.
    pub async fn load(provider: &PdfProvider, options: DocumentOptions) -> Result<Self> {
        let document = Self::new(provider, options);
        document.wait_for_load().await?;
        Ok(document)
    }

    pub async fn wait_for_load(&self) -> Result<()> {
        self.inner.loading.wait().await
    }

    /// Loaded pages whose text matches `regexp`, keyed by page number
    pub fn apply_filter(&self, regexp: &Regex) -> BTreeMap<u32, PdfPage> {
        self.inner
            .state
            .pages
            .read()
            .iter()
            .filter(|(_, page)| page.search(regexp).is_some_and(|m| !m.is_empty()))
            .map(|(page_no, page)| (*page_no, page.clone()))
            .collect()
    }

    /// Loaded pages keyed by the text `regexp` matched on them.
    ///
    /// Keys keep the order in which they were first matched. When several
    /// pages produce the same match, the highest page number wins.
    pub fn apply_filter_indexed(&self, regexp: &Regex) -> Vec<(String, PdfPage)> {
        let pages = self.inner.state.pages.read();

        let mut matched: Vec<(String, PdfPage)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for page in pages.values() {
            let Some(key) = page.search(regexp).filter(|m| !m.is_empty()) else {
                continue;
            };

            match positions.get(&key) {
                Some(&i) => matched[i].1 = page.clone(),
                None => {
                    positions.insert(key.clone(), matched.len());
                    matched.push((key, page.clone()));
                }
            }
        }

        matched
    }

    /// Page count and version details; `NotReady` until the file is parsed
    pub fn info(&self) -> Result<DocumentInfo> {
        let document = self
            .inner
            .state
            .engine_document
            .get()
            .ok_or_else(|| PdfError::NotReady("document".to_string()))?;
        let metadata = self.inner.state.metadata.get();

        Ok(DocumentInfo {
            no_of_pages: document.page_count(),
            format_version: metadata.and_then(|m| m.format_version.clone()),
            creator: metadata.and_then(|m| m.creator.clone()),
            producer: metadata.and_then(|m| m.producer.clone()),
        })
    }

    /// Full information dictionary, once read
    pub fn metadata(&self) -> Option<DocumentMetadata> {
        self.inner.state.metadata.get().cloned()
    }

    /// Snapshot of the pages loaded so far
    pub fn pages(&self) -> BTreeMap<u32, PdfPage> {
        self.inner.state.pages.read().clone()
    }

    pub fn page(&self, page_no: u32) -> Option<PdfPage> {
        self.inner.state.pages.read().get(&page_no).cloned()
    }

    pub fn has_errors(&self) -> bool {
        !self.inner.state.errors.read().is_empty()
    }

    /// Page load failures, in page order
    pub fn errors(&self) -> Vec<String> {
        self.inner.state.errors.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loading.is_ready()
    }
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("info", &self.info().ok())
            .field("pages", &self.inner.state.pages.read().len())
            .field("errors", &self.inner.state.errors.read().len())
            .finish()
    }
}

async fn run_load(
    provider: PdfProvider,
    state: Arc<DocumentState>,
    options: DocumentOptions,
) -> Result<()> {
    let engine = provider.ready_engine().await?;

    let size = options.file_buffer.len();
    let document = engine.open_document(options.file_buffer).await?;
    tracing::debug!(
        "Parsed {} byte document with {} page(s)",
        size,
        document.page_count()
    );
    let _ = state.engine_document.set(document.clone());

    let metadata = document.metadata().await?;
    let _ = state.metadata.set(metadata);

    if options.do_not_load_pages {
        tracing::debug!("Skipping page load");
        return Ok(());
    }

    load_pages(&provider, &state, document).await;

    let loaded = state.pages.read().len();
    let failed = state.errors.read().len();
    tracing::info!("Document loaded: {} page(s), {} failed", loaded, failed);

    Ok(())
}

/// Load pages 1..=N, recording failures instead of stopping.
///
/// Up to `page_concurrency` pages load at once. Results are applied in page
/// order regardless.
async fn load_pages(
    provider: &PdfProvider,
    state: &DocumentState,
    document: Arc<dyn EngineDocument>,
) {
    let page_count = document.page_count();
    let concurrency = provider.config().load.page_concurrency.max(1);

    let mut results = stream::iter(1..=page_count)
        .map(|page_no| {
            let options = PageOptions {
                provider: provider.clone(),
                document: document.clone(),
                page_no,
            };
            async move { (page_no, PdfPage::load(options).await) }
        })
        .buffered(concurrency);

    while let Some((page_no, result)) = results.next().await {
        match result {
            Ok(page) => {
                state.pages.write().insert(page_no, page);
            }
            Err(e) => {
                tracing::warn!("Failed to load page {}: {}", page_no, e);
                state
                    .errors
                    .write()
                    .push(format!("Unable to load Page #{} - {}", page_no, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::{MemoryDocument, MemoryEngine, MemoryPage, PdfEngine};

    const PDF_BYTES: &[u8] = b"%PDF-1.7\n";

    fn invoices() -> MemoryDocument {
        MemoryDocument::new(vec![
            MemoryPage::new(["Invoice No: 1001", "Page 1 of 2"]),
            MemoryPage::new(["Invoice No: 1001", "Page 2 of 2"]),
            MemoryPage::new(["Delivery note"]),
            MemoryPage::new(["Invoice No: 2002", "Page 1 of 1"]),
        ])
    }

    fn provider_for(engine: &MemoryEngine, config: Config) -> PdfProvider {
        PdfProvider::from_engine(config, Arc::new(engine.clone()))
    }

    #[tokio::test]
    async fn test_failed_page_is_recorded_and_skipped() {
        let engine = MemoryEngine::new(MemoryDocument::new(vec![
            MemoryPage::new(["one"]),
            MemoryPage::failing("broken stream"),
            MemoryPage::new(["three"]),
        ]));
        let provider = provider_for(&engine, Config::default());

        let doc = PdfDocument::load(&provider, DocumentOptions::new(PDF_BYTES.to_vec()))
            .await
            .unwrap();

        let pages = doc.pages();
        assert_eq!(pages.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(pages[&3].text(), "three");

        assert!(doc.has_errors());
        let errors = doc.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Unable to load Page #2 - "));
        assert!(errors[0].contains("broken stream"));

        assert_eq!(doc.info().unwrap().no_of_pages, 3);
        assert!(doc.page(2).is_none());
    }

    #[tokio::test]
    async fn test_info_reports_metadata() {
        let fixture = MemoryDocument::new(vec![MemoryPage::new(["x"])]).with_metadata(
            DocumentMetadata {
                format_version: Some("1.4".to_string()),
                creator: Some("Writer".to_string()),
                producer: Some("LibreOffice".to_string()),
                title: Some("Quarterly".to_string()),
                ..Default::default()
            },
        );
        let engine = MemoryEngine::new(fixture);
        let doc = provider_for(&engine, Config::default())
            .load_document(DocumentOptions::new(PDF_BYTES.to_vec()))
            .await
            .unwrap();

        let info = doc.info().unwrap();
        assert_eq!(
            info,
            DocumentInfo {
                no_of_pages: 1,
                format_version: Some("1.4".to_string()),
                creator: Some("Writer".to_string()),
                producer: Some("LibreOffice".to_string()),
            }
        );
        assert_eq!(doc.metadata().unwrap().title.as_deref(), Some("Quarterly"));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["no_of_pages"], 1);
        assert_eq!(json["format_version"], "1.4");
    }

    #[tokio::test]
    async fn test_apply_filter_by_page_number() {
        let engine = MemoryEngine::new(invoices());
        let doc = provider_for(&engine, Config::default())
            .load_document(DocumentOptions::new(PDF_BYTES.to_vec()))
            .await
            .unwrap();

        let regexp = Regex::new(r"InvoiceNo:(\d+)").unwrap();
        let filtered = doc.apply_filter(&regexp);
        assert_eq!(filtered.keys().copied().collect::<Vec<_>>(), vec![1, 2, 4]);

        let none = Regex::new("Receipt").unwrap();
        assert!(doc.apply_filter(&none).is_empty());
    }

    #[tokio::test]
    async fn test_apply_filter_skips_empty_matches() {
        let engine = MemoryEngine::new(invoices());
        let doc = provider_for(&engine, Config::default())
            .load_document(DocumentOptions::new(PDF_BYTES.to_vec()))
            .await
            .unwrap();

        // Matches the empty string on every page
        let regexp = Regex::new(r"\d*").unwrap();
        assert!(doc.apply_filter(&regexp).is_empty());
        assert!(doc.apply_filter_indexed(&regexp).is_empty());
    }

    #[tokio::test]
    async fn test_apply_filter_indexed_last_page_wins() {
        let engine = MemoryEngine::new(invoices());
        let doc = provider_for(&engine, Config::default())
            .load_document(DocumentOptions::new(PDF_BYTES.to_vec()))
            .await
            .unwrap();

        let regexp = Regex::new(r"InvoiceNo:(\d+)").unwrap();
        let indexed = doc.apply_filter_indexed(&regexp);

        let summary: Vec<(&str, u32)> = indexed
            .iter()
            .map(|(key, page)| (key.as_str(), page.page_no()))
            .collect();
        assert_eq!(summary, vec![("InvoiceNo:1001", 2), ("InvoiceNo:2002", 4)]);
    }

    #[tokio::test]
    async fn test_wait_for_load_does_not_repeat_work() {
        let engine = MemoryEngine::new(invoices());
        let provider = provider_for(&engine, Config::default());

        let doc = PdfDocument::new(&provider, DocumentOptions::new(PDF_BYTES.to_vec()));
        let clone = doc.clone();
        let (a, b) = tokio::join!(doc.wait_for_load(), clone.wait_for_load());
        a.unwrap();
        b.unwrap();
        doc.wait_for_load().await.unwrap();

        let stats = engine.stats();
        assert_eq!(stats.documents_opened, 1);
        assert_eq!(stats.pages_loaded, 4);
        assert_eq!(stats.text_fetches, 4);
        assert!(doc.is_loaded());
    }

    #[tokio::test]
    async fn test_is_loaded_without_waiting() {
        let engine = MemoryEngine::new(invoices());
        let provider = provider_for(&engine, Config::default());

        let doc = PdfDocument::new(&provider, DocumentOptions::new(PDF_BYTES.to_vec()));
        for _ in 0..100 {
            if doc.is_loaded() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(doc.is_loaded());
        assert_eq!(doc.pages().len(), 4);
        assert!(doc.pages().values().all(PdfPage::is_loaded));
    }

    #[tokio::test]
    async fn test_do_not_load_pages() {
        let engine = MemoryEngine::new(invoices());
        let doc = provider_for(&engine, Config::default())
            .load_document(DocumentOptions::new(PDF_BYTES.to_vec()).without_pages())
            .await
            .unwrap();

        assert_eq!(doc.info().unwrap().no_of_pages, 4);
        assert!(doc.pages().is_empty());
        assert!(!doc.has_errors());
        assert_eq!(engine.stats().pages_loaded, 0);
    }

    #[tokio::test]
    async fn test_parse_failure_propagates() {
        let engine = MemoryEngine::new(invoices());
        let provider = provider_for(&engine, Config::default());

        let doc = PdfDocument::new(&provider, DocumentOptions::new(b"GIF89a".to_vec()));
        let first = doc.wait_for_load().await;
        let second = doc.wait_for_load().await;

        assert!(matches!(first, Err(PdfError::Parse(_))));
        assert!(matches!(second, Err(PdfError::Parse(_))));
        assert!(matches!(doc.info(), Err(PdfError::NotReady(_))));
        assert!(!doc.is_loaded());
    }

    #[tokio::test]
    async fn test_document_waits_for_provider() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let engine = MemoryEngine::new(invoices());
        let loader_engine = engine.clone();

        let provider = PdfProvider::with_loader(Config::default(), move || async move {
            let _ = rx.await;
            Ok::<_, PdfError>(Arc::new(loader_engine) as Arc<dyn PdfEngine>)
        });

        let doc = PdfDocument::new(&provider, DocumentOptions::new(PDF_BYTES.to_vec()));
        tokio::task::yield_now().await;
        assert!(matches!(doc.info(), Err(PdfError::NotReady(_))));
        assert_eq!(engine.stats().documents_opened, 0);

        tx.send(()).unwrap();
        doc.wait_for_load().await.unwrap();
        assert_eq!(doc.pages().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_page_loading_keeps_order() {
        let mut config = Config::default();
        config.load.page_concurrency = 3;

        let engine = MemoryEngine::new(MemoryDocument::new(vec![
            MemoryPage::new(["a"]),
            MemoryPage::failing("bad font"),
            MemoryPage::new(["c"]),
            MemoryPage::failing("bad image"),
            MemoryPage::new(["e"]),
        ]));
        let doc = provider_for(&engine, config)
            .load_document(DocumentOptions::new(PDF_BYTES.to_vec()))
            .await
            .unwrap();

        assert_eq!(doc.pages().keys().copied().collect::<Vec<_>>(), vec![1, 3, 5]);
        let errors = doc.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Page #2"));
        assert!(errors[1].contains("Page #4"));
    }
}
