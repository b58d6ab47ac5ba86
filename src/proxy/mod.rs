//! Request forwarding and the retry/failover policy around it.

mod dispatcher;
mod forwarder;

pub use dispatcher::{Dispatcher, DEFAULT_BACKOFF_DELAY, DEFAULT_MAX_RETRIES};
pub use forwarder::{
    Forwarder, ForwardError, HttpForwarder, ProxyRequest, ProxyResponse, DEFAULT_CONNECT_TIMEOUT,
};
