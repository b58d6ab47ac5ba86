//! ringlb - a round-robin HTTP load balancer
//!
//! This crate provides a small load balancer built around:
//! - A shared backend pool with an atomic round-robin cursor
//! - Active TCP health probing that toggles backend liveness
//! - A bounded retry/failover policy per inbound request

pub mod config;
pub mod frontend;
pub mod health;
pub mod pool;
pub mod proxy;
pub mod util;

pub use config::Config;
