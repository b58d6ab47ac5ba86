//! Periodic liveness prober.
//!
//! Probes every backend in the pool on a fixed interval and flips each
//! backend's liveness flag according to the probe result.

use crate::pool::ServerPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Background task that keeps backend liveness flags up to date.
///
/// Holds no state besides the pool handle and its timing parameters; all
/// side effects are the liveness transitions on each backend.
pub struct HealthProber {
    /// Pool whose backends get probed.
    pool: Arc<ServerPool>,
    /// Time between probe passes.
    probe_interval: Duration,
    /// Bound on a single TCP probe.
    probe_timeout: Duration,
}

impl HealthProber {
    /// Create a new prober over the given pool.
    pub fn new(pool: Arc<ServerPool>, probe_interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            pool,
            probe_interval,
            probe_timeout,
        }
    }

    /// Run the prober until the shutdown signal fires.
    ///
    /// If a pass takes longer than the interval, overlapping ticks are
    /// skipped rather than queued, so a slow pass is followed by a fresh
    /// one instead of a burst.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            backends = self.pool.len(),
            interval = ?self.probe_interval,
            timeout = ?self.probe_timeout,
            "health prober starting"
        );

        let mut tick = interval(self.probe_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.probe_all().await;
                }

                _ = shutdown.recv() => {
                    info!("health prober shutting down");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, in registration order.
    ///
    /// Probes run sequentially so each backend's flag always reflects its
    /// most recent probe; a slow earlier probe can never overwrite a
    /// later result.
    pub async fn probe_all(&self) {
        for backend in self.pool.backends() {
            let was_alive = backend.is_alive();
            let up = backend.probe(self.probe_timeout).await;

            if up {
                backend.mark_alive();
            } else {
                backend.mark_down();
            }

            if up != was_alive {
                if up {
                    info!(backend = %backend.address(), "backend is back up");
                } else {
                    warn!(backend = %backend.address(), "backend is down");
                }
            } else {
                debug!(backend = %backend.address(), alive = up, "probe completed");
            }
        }
    }
}
