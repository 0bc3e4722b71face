//! Readiness signals
//!
//! A readiness signal wraps one spawned loading task in a shared future.
//! Every clone awaits the same task; the task runs exactly once and its
//! outcome (success or the cloned error) is handed to every waiter.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::{PdfError, Result};

#[derive(Clone)]
pub struct Readiness {
    inner: Shared<BoxFuture<'static, Result<()>>>,
    /// Set by the task itself: `true` on success, `false` on failure
    outcome: Arc<OnceLock<bool>>,
}

impl Readiness {
    /// Spawn `task` on the current Tokio runtime and return its signal.
    ///
    /// The task starts immediately, whether or not anyone awaits it.
    pub fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let outcome = Arc::new(OnceLock::new());

        let recorded = outcome.clone();
        let handle = tokio::spawn(async move {
            let result = task.await;
            let _ = recorded.set(result.is_ok());
            result
        });

        let joined = outcome.clone();
        let inner = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let _ = joined.set(false);
                    Err(PdfError::from(e))
                }
            }
        }
        .boxed()
        .shared();

        Self { inner, outcome }
    }

    /// An already-resolved signal.
    pub fn ready() -> Self {
        Self {
            inner: futures::future::ready(Ok(())).boxed().shared(),
            outcome: Arc::new(OnceLock::from(true)),
        }
    }

    /// Wait for the task to finish. Safe to call repeatedly and concurrently.
    pub async fn wait(&self) -> Result<()> {
        self.inner.clone().await
    }

    /// Whether the task has finished, successfully or not. Needs no waiter,
    /// except that a panicked task is only recorded once someone waits.
    pub fn is_settled(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Whether the task finished successfully. Needs no waiter.
    pub fn is_ready(&self) -> bool {
        self.outcome.get() == Some(&true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_task_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let signal = Readiness::spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), PdfError>(())
        });

        signal.wait().await.unwrap();
        signal.wait().await.unwrap();
        signal.clone().wait().await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(signal.is_ready());
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_outcome() {
        let signal = Readiness::spawn(async { Err::<(), _>(PdfError::Parse("bad header".into())) });

        let (a, b) = tokio::join!(signal.wait(), signal.wait());
        assert!(matches!(a, Err(PdfError::Parse(_))));
        assert!(matches!(b, Err(PdfError::Parse(_))));
        assert!(signal.is_settled());
        assert!(!signal.is_ready());
    }

    #[tokio::test]
    async fn test_panicking_task_reports_join_error() {
        let signal = Readiness::spawn(async {
            if true {
                panic!("engine exploded");
            }
            Ok::<(), PdfError>(())
        });
        assert!(matches!(signal.wait().await, Err(PdfError::TaskJoin(_))));
        assert!(signal.is_settled());
        assert!(!signal.is_ready());
    }

    #[tokio::test]
    async fn test_settles_without_a_waiter() {
        let ok = Readiness::spawn(async { Ok::<(), PdfError>(()) });
        let failed = Readiness::spawn(async { Err::<(), _>(PdfError::Parse("bad header".into())) });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(ok.is_settled());
        assert!(ok.is_ready());
        assert!(failed.is_settled());
        assert!(!failed.is_ready());
    }

    #[tokio::test]
    async fn test_ready_signal() {
        let signal = Readiness::ready();
        signal.wait().await.unwrap();
        assert!(signal.is_ready());
    }
}
