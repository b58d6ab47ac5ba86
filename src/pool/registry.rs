//! Round-robin server pool.

use crate::pool::Backend;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors from backend selection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// The pool has no backends registered at all.
    #[error("no backends configured")]
    NoBackendsConfigured,

    /// Every registered backend is currently marked down.
    #[error("all backends are down")]
    PoolExhausted,
}

/// Ordered collection of backends with a shared round-robin cursor.
///
/// Registration happens before the pool starts serving selections; this
/// is enforced by `register` taking `&mut self`, which is impossible once
/// the pool sits behind an `Arc`.
#[derive(Debug, Default)]
pub struct ServerPool {
    /// Backends in registration order. Fixed once traffic starts.
    backends: Vec<Arc<Backend>>,
    /// Index of the last backend handed out. Always within bounds.
    cursor: AtomicUsize,
}

impl ServerPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool from a list of addresses, in order.
    pub fn from_addresses(addresses: impl IntoIterator<Item = SocketAddr>) -> Self {
        let mut pool = Self::new();
        for address in addresses {
            pool.register(Backend::new(address));
        }
        pool
    }

    /// Append a backend. Only callable while the pool is still exclusively
    /// owned, before any selection traffic.
    pub fn register(&mut self, backend: Backend) {
        self.backends.push(Arc::new(backend));
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the pool has no backends.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// All backends in registration order.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Advance the cursor by one position, wrapping, and return the new
    /// index. The CAS loop keeps the stored value a valid index even
    /// under concurrent callers.
    fn advance(&self, len: usize) -> usize {
        let prev = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or(0);
        (prev + 1) % len
    }

    /// Select the next alive backend in round-robin order.
    ///
    /// The cursor is advanced unconditionally, so concurrent callers are
    /// spread across the ring before any of them has scanned for dead
    /// backends. The scan visits up to `len` consecutive slots starting
    /// at the advanced position; when it has to skip dead backends, the
    /// cursor is overwritten with the index actually returned, so later
    /// selections resume right after the backend that was used instead of
    /// re-scanning the dead stretch. That skip-ahead costs strict
    /// fairness when backends flap, which is accepted.
    ///
    /// Never awaits: the cursor is lock-free and liveness reads only take
    /// the per-backend lock.
    pub fn select_next(&self) -> Result<Arc<Backend>, SelectError> {
        let len = self.backends.len();
        if len == 0 {
            return Err(SelectError::NoBackendsConfigured);
        }

        let next = self.advance(len);
        for offset in 0..len {
            let idx = (next + offset) % len;
            let backend = &self.backends[idx];
            if backend.is_alive() {
                if idx != next {
                    self.cursor.store(idx, Ordering::Release);
                }
                debug!(backend = %backend.address(), "selected backend");
                return Ok(Arc::clone(backend));
            }
        }

        Err(SelectError::PoolExhausted)
    }
}
