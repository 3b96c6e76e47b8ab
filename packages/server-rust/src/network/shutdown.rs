//! Graceful shutdown controller with in-flight request tracking.
//!
//! Health state lives in an `ArcSwap` so probes read it without locking;
//! in-flight gateway calls are counted with RAII guards. The listener's
//! shutdown signal is routed through [`ShutdownController::draining_on`] so
//! `/health` reports `draining` while connections are still open, and
//! [`ShutdownController::drain_expired`] caps how long they may stay open.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tracing::{info, warn};

/// Interval between in-flight checks while draining.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Listener health, transitioned by the shutdown controller.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Registry built, listener not yet serving.
    Starting,
    /// Serving requests.
    Ready,
    /// Listener closed; waiting for in-flight requests.
    Draining,
    /// Listener closed.
    Stopped,
}

impl HealthState {
    /// Lowercase name reported by the health endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Coordinates shutdown between the listener, the gateway handler and the
/// health probes.
///
/// `trigger_shutdown()` moves to Draining and notifies receivers;
/// `wait_for_drain()` waits for outstanding [`InFlightGuard`]s.
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    health_state: Arc<ArcSwap<HealthState>>,
}

impl ShutdownController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutdown_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            health_state: Arc::new(ArcSwap::from_pointee(HealthState::Starting)),
        }
    }

    pub fn set_ready(&self) {
        self.health_state.store(Arc::new(HealthState::Ready));
    }

    /// Returns a receiver flipped to `true` once shutdown is triggered.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Moves to `Draining` and signals every receiver.
    pub fn trigger_shutdown(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
        // No receivers is fine.
        let _ = self.shutdown_signal.send(true);
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// Counts one in-flight request until the guard is dropped.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Wraps the listener's shutdown signal: once `signal` fires the
    /// controller moves to `Draining` before the listener stops accepting.
    pub fn draining_on(
        self: &Arc<Self>,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> impl Future<Output = ()> + Send + 'static {
        let controller = Arc::clone(self);
        async move {
            signal.await;
            controller.trigger_shutdown();
        }
    }

    /// Resolves only when a triggered drain outlives `timeout` with gateway
    /// requests still running; pending otherwise.
    ///
    /// Raced against the listener so a stuck request cannot hold shutdown
    /// open past the drain window.
    pub async fn drain_expired(&self, timeout: Duration) {
        let mut signal = self.shutdown_receiver();
        let triggered = signal.wait_for(|triggered| *triggered).await.is_ok();
        if !triggered {
            return std::future::pending().await;
        }

        let in_flight = self.in_flight_count();
        if in_flight > 0 {
            info!(in_flight, "Draining in-flight gateway requests");
        }

        if self.wait_for_drain(timeout).await {
            info!("All gateway requests drained");
            return std::future::pending().await;
        }
        warn!(
            in_flight = self.in_flight_count(),
            "Drain timeout expired with gateway requests still running"
        );
    }

    /// Marks the listener closed.
    pub fn finish(&self) {
        self.health_state.store(Arc::new(HealthState::Stopped));
    }

    /// Waits for in-flight requests to finish, up to `timeout`.
    ///
    /// Returns `true` and moves to `Stopped` once the count reaches zero;
    /// returns `false` on timeout, leaving the state at `Draining`.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                self.health_state.store(Arc::new(HealthState::Stopped));
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                return false;
            }

            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once `signal` fires.
///
/// A signal handler that cannot be installed is logged and the returned
/// future never resolves, so the server keeps serving until killed.
pub async fn on_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "cannot listen for shutdown signal; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Decrements the in-flight counter on drop, including during unwinding.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
