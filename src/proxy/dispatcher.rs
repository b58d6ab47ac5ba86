//! Retry and failover coordination.
//!
//! One [`Dispatcher::handle`] call covers the full life of an inbound
//! request: pick a backend, forward, retry the same backend on failure,
//! and fail over to another backend once the retry budget is spent.

use crate::pool::{Backend, SelectError, ServerPool};
use crate::proxy::{Forwarder, ForwardError, ProxyRequest, ProxyResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default retry budget per backend.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait between same-backend retries.
pub const DEFAULT_BACKOFF_DELAY: Duration = Duration::from_millis(10);

/// Per-request retry/failover coordinator.
pub struct Dispatcher<F> {
    /// Pool to select backends from.
    pool: Arc<ServerPool>,
    /// Forwarding capability.
    forwarder: F,
    /// Retries allowed against one backend before failing over.
    max_retries: u32,
    /// Fixed wait between same-backend retries.
    backoff_delay: Duration,
}

impl<F: Forwarder> Dispatcher<F> {
    /// Create a new dispatcher over the given pool and forwarder.
    pub fn new(
        pool: Arc<ServerPool>,
        forwarder: F,
        max_retries: u32,
        backoff_delay: Duration,
    ) -> Self {
        Self {
            pool,
            forwarder,
            max_retries,
            backoff_delay,
        }
    }

    /// Dispatch one inbound request.
    ///
    /// Transient forwarding failures are absorbed here; the only errors
    /// that reach the caller are selection failures, surfaced as a
    /// service-unavailable condition. Failover is a loop bounded by the
    /// pool size, so a request cycles through the registry at most once
    /// when backend after backend is failing.
    ///
    /// The backoff waits sit at `.await` points, so dropping the returned
    /// future (client disconnect) aborts the retry loop early.
    pub async fn handle(&self, req: ProxyRequest) -> Result<ProxyResponse, SelectError> {
        let mut backend = self.pool.select_next()?;

        for _ in 0..self.pool.len() {
            match self.try_backend(&req, &backend).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(
                        backend = %backend.address(),
                        error = %err,
                        retries = self.max_retries,
                        "backend exhausted its retry budget, disabling and failing over"
                    );
                    backend.mark_down();
                    backend = self.pool.select_next()?;
                }
            }
        }

        Err(SelectError::PoolExhausted)
    }

    /// Forward to a single backend, retrying up to `max_retries` times
    /// with a fixed backoff. Returns the last error once the budget is
    /// spent; the caller decides what to do with the backend.
    async fn try_backend(
        &self,
        req: &ProxyRequest,
        backend: &Backend,
    ) -> Result<ProxyResponse, ForwardError> {
        let mut attempt = 0u32;
        loop {
            match self.forwarder.forward(req.clone(), backend.address()).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_retries => {
                    debug!(
                        backend = %backend.address(),
                        attempt,
                        error = %err,
                        "forward failed, retrying same backend after backoff"
                    );
                    sleep(self.backoff_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
