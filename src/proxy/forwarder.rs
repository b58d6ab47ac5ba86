//! Forwarding boundary to upstream backends.
//!
//! The dispatcher only sees the [`Forwarder`] trait; the byte-level HTTP
//! exchange lives behind it. Requests are buffered into [`ProxyRequest`]
//! so the same request can be replayed across retries.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Default bound on establishing a backend connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A single forwarding attempt failed.
///
/// The dispatcher treats every variant uniformly; the distinction only
/// matters for logging.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to connect to backend: {0}")]
    Connect(#[source] std::io::Error),

    #[error("backend HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),
}

/// An inbound HTTP request with its body fully buffered.
#[derive(Clone, Debug)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    /// Buffer a hyper request, collecting the whole body into memory.
    pub async fn buffer(req: Request<Incoming>) -> Result<Self, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        })
    }
}

/// A backend's response, body fully buffered.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Capability to forward one request to one backend address.
pub trait Forwarder: Send + Sync {
    /// Forward `req` to `backend` and return the backend's response.
    ///
    /// Any non-success outcome is a [`ForwardError`], regardless of the
    /// underlying cause.
    fn forward(
        &self,
        req: ProxyRequest,
        backend: SocketAddr,
    ) -> impl Future<Output = Result<ProxyResponse, ForwardError>> + Send;
}

/// HTTP/1.1 forwarder over a fresh TCP connection per attempt.
pub struct HttpForwarder {
    /// Bound on establishing the backend connection.
    connect_timeout: Duration,
}

impl HttpForwarder {
    /// Create a forwarder with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Forwarder for HttpForwarder {
    fn forward(
        &self,
        req: ProxyRequest,
        backend: SocketAddr,
    ) -> impl Future<Output = Result<ProxyResponse, ForwardError>> + Send {
        let connect_timeout = self.connect_timeout;
        async move {
            let stream = match timeout(connect_timeout, TcpStream::connect(backend)).await {
                Ok(Ok(stream)) => {
                    let _ = stream.set_nodelay(true);
                    stream
                }
                Ok(Err(e)) => return Err(ForwardError::Connect(e)),
                Err(_) => {
                    return Err(ForwardError::Connect(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    )))
                }
            };

            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

            // Drive the connection in the background for the lifetime of
            // this exchange.
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(error = %e, "backend connection error");
                }
            });

            let mut outbound = Request::new(Full::new(req.body));
            *outbound.method_mut() = req.method;
            *outbound.uri_mut() = origin_form(&req.uri);
            *outbound.headers_mut() = req.headers;

            let response = sender.send_request(outbound).await?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await?.to_bytes();

            Ok(ProxyResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        }
    }
}

/// Reduce a URI to origin-form (path and query only), as required on the
/// request line when proxying.
fn origin_form(uri: &Uri) -> Uri {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .parse()
        .unwrap_or_else(|_| Uri::from_static("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Minimal HTTP server that answers every request with `body`.
    fn start_http_server(body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for mut stream in listener.incoming().flatten() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        addr
    }

    fn test_request() -> ProxyRequest {
        let mut headers = HeaderMap::new();
        headers.insert("host", "localhost".parse().unwrap());
        ProxyRequest {
            method: Method::GET,
            uri: "/".parse().unwrap(),
            headers,
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_origin_form() {
        let absolute: Uri = "http://example.com/a/b?q=1".parse().unwrap();
        assert_eq!(origin_form(&absolute), "/a/b?q=1");

        let bare: Uri = "/x".parse().unwrap();
        assert_eq!(origin_form(&bare), "/x");
    }

    #[tokio::test]
    async fn test_forward_success() {
        let addr = start_http_server("hello");
        let forwarder = HttpForwarder::default();

        let response = forwarder.forward(test_request(), addr).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_forward_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let forwarder = HttpForwarder::default();
        let result = forwarder.forward(test_request(), addr).await;
        assert!(matches!(result, Err(ForwardError::Connect(_))));
    }
}
