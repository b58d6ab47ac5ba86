//! Backend pool: upstream identities, liveness tracking, and round-robin
//! selection.

mod backend;
mod registry;

pub use backend::Backend;
pub use registry::{SelectError, ServerPool};
