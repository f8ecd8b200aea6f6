//! Synchroniser supervisor (spec.md §4.8).
//!
//! One `Synchroniser` owns one venue adapter's full lifecycle: start,
//! per-venue watchdog, idempotent stop. Generalises the teacher's
//! `bot::Bot` running-flag pattern (`Mutex<bool>` guarding re-entry,
//! lock-check-then-set on both `start`/`stop`) to the spec's own contract —
//! a ticker-driven watchdog that also subscribes to SIGINT/SIGTERM, rather
//! than a detection loop.

mod error;

pub use error::SupervisorError;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::venues::VenueAdapter;

/// Watchdog tick period (spec.md §4.8, recommended 1s).
const WATCHDOG_PERIOD: Duration = Duration::from_secs(1);

/// Owns one venue's adapter and its watchdog (spec.md §4.8).
pub struct Synchroniser {
    adapter: Arc<dyn VenueAdapter>,
    running: Mutex<bool>,
}

impl Synchroniser {
    pub fn new(adapter: Arc<dyn VenueAdapter>) -> Arc<Self> {
        Arc::new(Self { adapter, running: Mutex::new(false) })
    }

    /// Fails with [`SupervisorError::AlreadyRunning`] if re-entered.
    /// Spawns the watchdog, opens streams, authenticates, subscribes, and
    /// runs bootstrap; any failure along this path leaves no dangling
    /// connected session (spec.md §4.8, delegated to the adapter's own
    /// `start()` unwind).
    pub async fn start(self: &Arc<Self>) -> Result<(), SupervisorError> {
        {
            let mut running = self.running.lock().await;
            if *running {
                return Err(SupervisorError::AlreadyRunning);
            }
            *running = true;
        }

        info!(venue = self.adapter.name(), "starting synchroniser");
        if let Err(e) = self.adapter.start().await {
            *self.running.lock().await = false;
            return Err(SupervisorError::Venue(e));
        }

        let watchdog = Arc::clone(self);
        tokio::spawn(async move { watchdog.watch().await });

        Ok(())
    }

    /// Idempotent: closes every streaming session this venue owns.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        {
            let mut running = self.running.lock().await;
            if !*running {
                return Ok(());
            }
            *running = false;
        }

        info!(venue = self.adapter.name(), "stopping synchroniser");
        self.adapter.stop().await.map_err(SupervisorError::Venue)
    }

    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    /// Ticker-driven task that observes link liveness and the process
    /// termination signals, invoking `stop()` exactly once (spec.md §4.8:
    /// "on signal, or when any liveness flag goes false, it invokes Stop()
    /// exactly once and exits"). Relies on `stop()`'s own idempotency rather
    /// than tracking a separate "already triggered" flag.
    async fn watch(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(WATCHDOG_PERIOD);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.is_running().await {
                        break;
                    }
                    if !self.adapter.sessions_alive() {
                        warn!(venue = self.adapter.name(), "session degraded, stopping");
                        let _ = self.stop().await;
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(venue = self.adapter.name(), "received interrupt signal");
                    let _ = self.stop().await;
                    break;
                }
                _ = wait_for_terminate() => {
                    info!(venue = self.adapter.name(), "received terminate signal");
                    let _ = self.stop().await;
                    break;
                }
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::venues::VenueError;

    struct StubAdapter {
        started: AtomicUsize,
        stopped: AtomicUsize,
        alive: AtomicBool,
    }

    #[async_trait]
    impl VenueAdapter for StubAdapter {
        fn name(&self) -> &str {
            "stub"
        }

        async fn start(&self) -> Result<(), VenueError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<(), VenueError> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn sessions_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let adapter =
            Arc::new(StubAdapter { started: AtomicUsize::new(0), stopped: AtomicUsize::new(0), alive: AtomicBool::new(true) });
        let sync = Synchroniser::new(adapter.clone());

        sync.start().await.unwrap();
        assert!(matches!(sync.start().await, Err(SupervisorError::AlreadyRunning)));
        assert_eq!(adapter.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_stop_is_a_clean_no_op() {
        let adapter =
            Arc::new(StubAdapter { started: AtomicUsize::new(0), stopped: AtomicUsize::new(0), alive: AtomicBool::new(true) });
        let sync = Synchroniser::new(adapter.clone());

        sync.start().await.unwrap();
        sync.stop().await.unwrap();
        sync.stop().await.unwrap();
        assert_eq!(adapter.stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let adapter =
            Arc::new(StubAdapter { started: AtomicUsize::new(0), stopped: AtomicUsize::new(0), alive: AtomicBool::new(true) });
        let sync = Synchroniser::new(adapter);

        sync.stop().await.unwrap();
    }
}
