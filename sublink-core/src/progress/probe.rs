//! Connectivity probe
//!
//! Polls the server health endpoint and reports reachability changes. The
//! first observation is always reported.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::api::ProgressBackend;

/// Receives reachability transitions
pub trait ConnectivityListener: Send + Sync + 'static {
    fn connectivity_changed(&self, online: bool) -> BoxFuture<'static, ()>;
}

/// Background health poller
#[derive(Default)]
pub struct ConnectivityProbe {
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl ConnectivityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.cancel
            .lock()
            .as_ref()
            .map_or(false, |tx| !tx.is_closed())
    }

    /// Start polling, replacing any running loop
    pub fn start(
        &self,
        backend: Arc<dyn ProgressBackend>,
        interval: Duration,
        listener: Arc<dyn ConnectivityListener>,
    ) {
        self.stop();

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        *self.cancel.lock() = Some(cancel_tx);

        tokio::spawn(async move {
            debug!("Connectivity probe started ({:?})", interval);
            let mut last: Option<bool> = None;

            loop {
                let online = tokio::select! {
                    _ = &mut cancel_rx => break,
                    result = backend.ping() => result.is_ok(),
                };

                if last != Some(online) {
                    info!("Server {}", if online { "reachable" } else { "unreachable" });
                    last = Some(online);
                    listener.connectivity_changed(online).await;
                }

                tokio::select! {
                    _ = &mut cancel_rx => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }

            debug!("Connectivity probe stopped");
        });
    }

    pub fn stop(&self) {
        if let Some(tx) = self.cancel.lock().take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ConnectivityProbe {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ContentId, ProgressRecord, ProgressUpdate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Flaky {
        down: AtomicBool,
    }

    #[async_trait]
    impl ProgressBackend for Flaky {
        async fn get_progress(&self, _: &ContentId) -> Result<Option<ProgressRecord>, ApiError> {
            Ok(None)
        }

        async fn put_progress(&self, _: &ContentId, _: &ProgressUpdate) -> Result<ProgressRecord, ApiError> {
            Err(ApiError::Unreachable("unused".to_string()))
        }

        async fn ping(&self) -> Result<(), ApiError> {
            if self.down.load(Ordering::SeqCst) {
                Err(ApiError::Unreachable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<bool>>,
    }

    impl ConnectivityListener for Recorder {
        fn connectivity_changed(&self, online: bool) -> BoxFuture<'static, ()> {
            self.seen.lock().push(online);
            Box::pin(async {})
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_transitions_only() {
        let backend = Arc::new(Flaky::default());
        let recorder = Arc::new(Recorder::default());
        let probe = ConnectivityProbe::new();

        probe.start(backend.clone(), Duration::from_secs(10), recorder.clone());
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(*recorder.seen.lock(), vec![true]);

        backend.down.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        backend.down.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(*recorder.seen.lock(), vec![true, false, true]);
        assert!(probe.is_running());

        probe.stop();
        backend.down.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(recorder.seen.lock().len(), 3);
        assert!(!probe.is_running());
    }
}
