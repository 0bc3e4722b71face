//! Engine provider
//!
//! Bootstraps the PDF engine once per provider and hands it to every
//! document loaded through it. Providers are cheap to clone; clones share
//! the same engine and bootstrap signal.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use crate::config::Config;
use crate::document::{DocumentOptions, PdfDocument};
use crate::engine::{MupdfEngine, PdfEngine};
use crate::error::{PdfError, Result};
use crate::readiness::Readiness;

#[derive(Clone)]
pub struct PdfProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    config: Config,
    engine: Arc<OnceLock<Arc<dyn PdfEngine>>>,
    building: Readiness,
}

impl PdfProvider {
    /// Start bootstrapping the MuPDF engine with default configuration.
    ///
    /// Must be called from within a Tokio runtime.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Start bootstrapping the MuPDF engine.
    pub fn with_config(config: Config) -> Self {
        Self::with_loader(config, || async {
            let engine = MupdfEngine::initialize().await?;
            Ok::<_, PdfError>(Arc::new(engine) as Arc<dyn PdfEngine>)
        })
    }

    /// Start bootstrapping an engine produced by `loader`.
    pub fn with_loader<F, Fut>(config: Config, loader: F) -> Self
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn PdfEngine>>> + Send + 'static,
    {
        let engine = Arc::new(OnceLock::new());

        let slot = engine.clone();
        let loading = loader();
        let building = Readiness::spawn(async move {
            let engine = loading.await?;
            tracing::debug!("PDF engine '{}' ready", engine.name());
            // Only this task writes the slot
            let _ = slot.set(engine);
            Ok(())
        });

        Self {
            inner: Arc::new(ProviderInner {
                config,
                engine,
                building,
            }),
        }
    }

    /// Provider over an engine that is already initialized.
    pub fn from_engine(config: Config, engine: Arc<dyn PdfEngine>) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                config,
                engine: Arc::new(OnceLock::from(engine)),
                building: Readiness::ready(),
            }),
        }
    }

    /// Construct a MuPDF provider and wait for its bootstrap.
    pub async fn build() -> Result<Self> {
        Self::build_with_config(Config::default()).await
    }

    /// Construct a MuPDF provider with `config` and wait for its bootstrap.
    pub async fn build_with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let provider = Self::with_config(config);
        provider.wait_for_build().await?;
        Ok(provider)
    }

    /// Wait for the engine bootstrap. Repeated calls do not bootstrap again.
    pub async fn wait_for_build(&self) -> Result<()> {
        self.inner.building.wait().await
    }

    /// Load a document through this provider and wait for it to finish.
    pub async fn load_document(&self, options: DocumentOptions) -> Result<PdfDocument> {
        PdfDocument::load(self, options).await
    }

    /// The engine handle; `NotReady` until the bootstrap has completed.
    pub fn engine(&self) -> Result<Arc<dyn PdfEngine>> {
        self.inner
            .engine
            .get()
            .cloned()
            .ok_or_else(|| PdfError::NotReady("PDF engine".to_string()))
    }

    /// Wait for the bootstrap, then return the engine.
    pub(crate) async fn ready_engine(&self) -> Result<Arc<dyn PdfEngine>> {
        self.wait_for_build().await?;
        self.engine()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.engine.get().is_some()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryDocument, MemoryEngine, MemoryPage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_engine() -> MemoryEngine {
        MemoryEngine::new(MemoryDocument::new(vec![MemoryPage::new(["Only page"])]))
    }

    #[tokio::test]
    async fn test_wait_for_build_is_idempotent() {
        let boots = Arc::new(AtomicUsize::new(0));
        let counter = boots.clone();
        let engine = memory_engine();

        let provider = PdfProvider::with_loader(Config::default(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, PdfError>(Arc::new(engine) as Arc<dyn PdfEngine>)
        });

        let clone = provider.clone();
        let (a, b) = tokio::join!(provider.wait_for_build(), clone.wait_for_build());
        a.unwrap();
        b.unwrap();
        provider.wait_for_build().await.unwrap();

        assert_eq!(boots.load(Ordering::SeqCst), 1);
        assert!(provider.is_ready());
        assert_eq!(provider.engine().unwrap().name(), "memory");
    }

    #[tokio::test]
    async fn test_engine_not_ready_before_bootstrap() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let engine = memory_engine();

        let provider = PdfProvider::with_loader(Config::default(), move || async move {
            let _ = rx.await;
            Ok::<_, PdfError>(Arc::new(engine) as Arc<dyn PdfEngine>)
        });

        assert!(matches!(provider.engine(), Err(PdfError::NotReady(_))));
        assert!(!provider.is_ready());

        tx.send(()).unwrap();
        provider.wait_for_build().await.unwrap();
        assert!(provider.engine().is_ok());
    }

    #[tokio::test]
    async fn test_bootstrap_failure_propagates() {
        let provider = PdfProvider::with_loader(Config::default(), || async {
            Err::<Arc<dyn PdfEngine>, _>(PdfError::EngineInit("library missing".to_string()))
        });

        let first = provider.wait_for_build().await;
        let second = provider.wait_for_build().await;
        assert!(matches!(first, Err(PdfError::EngineInit(_))));
        assert!(matches!(second, Err(PdfError::EngineInit(_))));
        assert!(provider.engine().is_err());
    }

    #[tokio::test]
    async fn test_from_engine_is_ready_immediately() {
        let provider = PdfProvider::from_engine(Config::default(), Arc::new(memory_engine()));
        assert!(provider.is_ready());
        provider.wait_for_build().await.unwrap();
    }

    #[test]
    fn test_from_engine_needs_no_runtime() {
        // Plain test: no Tokio runtime is running here
        let provider = PdfProvider::from_engine(Config::default(), Arc::new(memory_engine()));
        assert!(provider.is_ready());
        assert_eq!(provider.engine().unwrap().name(), "memory");
    }

    #[tokio::test]
    async fn test_load_document_through_provider() {
        let provider = PdfProvider::from_engine(Config::default(), Arc::new(memory_engine()));
        let doc = provider
            .load_document(DocumentOptions::new(b"%PDF-1.7".to_vec()))
            .await
            .unwrap();

        assert_eq!(doc.info().unwrap().no_of_pages, 1);
        assert_eq!(doc.pages().len(), 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_build_mupdf_provider() {
        // Requires the MuPDF library to be linked
        let provider = PdfProvider::build().await.unwrap();
        assert_eq!(provider.engine().unwrap().name(), "mupdf");
    }
}
