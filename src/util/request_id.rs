//! Request ID generation for log correlation.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Counter for short request IDs.
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier attached to a connection's log events.
#[derive(Clone, Debug)]
pub struct RequestId(String);

impl RequestId {
    /// Globally unique UUID-based ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Counter-based ID, unique within this process and cheaper than a
    /// UUID. Format: `req-{counter:016x}`.
    pub fn short() -> Self {
        let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("req-{:016x}", count))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_ids_differ() {
        assert_ne!(RequestId::new().as_str(), RequestId::new().as_str());
    }

    #[test]
    fn test_short_id_format_and_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = RequestId::short();
            assert!(id.as_str().starts_with("req-"));
            assert!(ids.insert(id.as_str().to_string()), "duplicate ID");
        }
    }
}
