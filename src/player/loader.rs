//! One-time loading of the player API script
//!
//! The script announces itself through a single global ready callback. The
//! first caller installs that callback ([`ReadySlot`]) and requests the
//! script; every other caller, concurrent or later, awaits the same
//! initialization. Once resolved it is never repeated.

use crate::utils::error::EmbedError;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, OnceCell};
use tracing::{debug, error, info};

/// Player API script requested on first use
pub const PLAYER_API_SCRIPT: &str = "https://www.youtube.com/iframe_api";

/// The page-wide "API ready" callback. Resolves at most once.
#[derive(Debug, Clone)]
pub struct ReadySlot {
    inner: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ReadySlot {
    fn new(tx: oneshot::Sender<()>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Signal readiness. Only the first call has an effect.
    pub fn resolve(&self) -> bool {
        let sender = match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// Adds a script element to the page
#[async_trait]
pub trait ScriptInjector: Send + Sync {
    /// Request `src`. The script calls `slot.resolve()` once it has loaded.
    async fn inject(&self, src: &str, slot: ReadySlot) -> Result<()>;
}

/// Memoized loader shared by every controller on a page
pub struct ApiLoader {
    injector: Arc<dyn ScriptInjector>,
    /// Outcome of the single load; failures are kept too
    outcome: OnceCell<Result<(), String>>,
    requests: AtomicUsize,
}

impl ApiLoader {
    pub fn new(injector: Arc<dyn ScriptInjector>) -> Self {
        Self {
            injector,
            outcome: OnceCell::new(),
            requests: AtomicUsize::new(0),
        }
    }

    /// Wait until the player API is available, loading it if nobody has yet.
    ///
    /// There is no timeout: a script that never calls back keeps callers
    /// waiting. The script is requested at most once. If that request fails
    /// (injector error, or a slot dropped without resolving) every caller,
    /// now and later, gets [`EmbedError::LoaderUnavailable`].
    pub async fn ensure_loaded(&self) -> Result<()> {
        let outcome = self
            .outcome
            .get_or_init(|| async {
                self.load().await.map_err(|e| {
                    error!("Player API failed to load: {:#}", e);
                    e.to_string()
                })
            })
            .await;
        match outcome {
            Ok(()) => Ok(()),
            Err(_) => Err(EmbedError::LoaderUnavailable.into()),
        }
    }

    async fn load(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        // Installed before the request goes out
        let slot = ReadySlot::new(tx);
        debug!("Requesting player API script");
        self.injector.inject(PLAYER_API_SCRIPT, slot).await?;
        rx.await.map_err(|_| EmbedError::LoaderUnavailable)?;
        info!("Player API ready");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(())))
    }

    /// The load ran and failed
    pub fn has_failed(&self) -> bool {
        matches!(self.outcome.get(), Some(Err(_)))
    }

    /// How many times the script has been requested
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}
