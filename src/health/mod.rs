//! Active health probing for the backend pool.

mod prober;

pub use prober::HealthProber;
