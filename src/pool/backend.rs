//! A single upstream backend.

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// One upstream endpoint plus its liveness flag.
///
/// The liveness flag is shared between the health prober, the pool's
/// selection scan, and the dispatcher's failover path, so every access
/// goes through the per-backend lock.
#[derive(Debug)]
pub struct Backend {
    /// Network address of the upstream server.
    address: SocketAddr,
    /// Whether this backend is currently considered reachable.
    alive: Mutex<bool>,
}

impl Backend {
    /// Create a backend. New backends start alive.
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            alive: Mutex::new(true),
        }
    }

    /// The backend's network address.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Mark the backend reachable. Idempotent.
    pub fn mark_alive(&self) {
        *self.alive.lock() = true;
    }

    /// Mark the backend unreachable. Idempotent.
    pub fn mark_down(&self) {
        *self.alive.lock() = false;
    }

    /// Synchronized read of the liveness flag.
    pub fn is_alive(&self) -> bool {
        *self.alive.lock()
    }

    /// Attempt a TCP connect to the backend within `probe_timeout`.
    ///
    /// Returns `true` if the connection was established, `false` on any
    /// connection error or timeout. This is the only Backend operation
    /// that performs I/O, and it blocks at most `probe_timeout`.
    pub async fn probe(&self, probe_timeout: Duration) -> bool {
        match timeout(probe_timeout, TcpStream::connect(self.address)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(backend = %self.address, error = %e, "probe connect failed");
                false
            }
            Err(_) => {
                debug!(backend = %self.address, "probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_starts_alive() {
        let backend = Backend::new("127.0.0.1:8001".parse().unwrap());
        assert!(backend.is_alive());
    }

    #[test]
    fn test_mark_down_and_alive() {
        let backend = Backend::new("127.0.0.1:8001".parse().unwrap());

        backend.mark_down();
        assert!(!backend.is_alive());

        // Idempotent
        backend.mark_down();
        assert!(!backend.is_alive());

        backend.mark_alive();
        assert!(backend.is_alive());
    }

    #[tokio::test]
    async fn test_probe_success() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let backend = Backend::new(addr);
        assert!(backend.probe(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_probe_refused() {
        // Reserve a port, then close it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = Backend::new(addr);
        assert!(!backend.probe(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        // Non-routable address to trigger the timeout path.
        let backend = Backend::new("10.255.255.1:12345".parse().unwrap());
        assert!(!backend.probe(Duration::from_millis(100)).await);
    }
}
