//! Frontend listener implementation.
//!
//! Accepts inbound connections and serves each one over HTTP/1.1,
//! handing every request to the dispatcher.

use crate::proxy::{Dispatcher, Forwarder, ProxyRequest};
use crate::util::RequestId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Listener that accepts connections and serves them through a
/// [`Dispatcher`].
pub struct FrontendListener<F> {
    /// TCP listener.
    listener: TcpListener,
    /// Retry/failover coordinator shared across connections.
    dispatcher: Arc<Dispatcher<F>>,
}

impl<F: Forwarder + 'static> FrontendListener<F> {
    /// Bind the listener on `listen`.
    pub async fn bind(listen: SocketAddr, dispatcher: Arc<Dispatcher<F>>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        info!(listen = %listen, "frontend listener bound");
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    /// The address actually bound (useful when listening on port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the listener, accepting connections until shutdown.
    #[instrument(skip_all)]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("frontend listener starting");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("frontend listener shutting down");
                    break;
                }
            }
        }
    }

    /// Spawn a task serving one client connection.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let request_id = RequestId::short();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let io = TokioIo::new(stream);

            let service = service_fn(move |req| {
                let dispatcher = Arc::clone(&dispatcher);
                let request_id = request_id.clone();
                async move { serve_request(req, dispatcher, client_addr, request_id).await }
            });

            let result = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(io, service)
                .await;

            let duration = start_time.elapsed();
            match result {
                Ok(()) => debug!(
                    client = %client_addr,
                    duration_ms = duration.as_millis(),
                    "connection completed"
                ),
                Err(e) => debug!(
                    client = %client_addr,
                    duration_ms = duration.as_millis(),
                    error = %e,
                    "connection ended with error"
                ),
            }
        });
    }
}

/// Serve one inbound request: buffer it, dispatch it, and map selection
/// failures to 503.
async fn serve_request<F: Forwarder>(
    req: Request<Incoming>,
    dispatcher: Arc<Dispatcher<F>>,
    client_addr: SocketAddr,
    request_id: RequestId,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start_time = Instant::now();

    let mut buffered = match ProxyRequest::buffer(req).await {
        Ok(buffered) => buffered,
        Err(e) => {
            warn!(
                request_id = %request_id,
                client = %client_addr,
                error = %e,
                "failed to read request body"
            );
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                "failed to read request body",
            ));
        }
    };

    add_forwarding_headers(&mut buffered, client_addr);

    match dispatcher.handle(buffered).await {
        Ok(backend_response) => {
            let duration = start_time.elapsed();
            info!(
                request_id = %request_id,
                client = %client_addr,
                method = %method,
                uri = %uri,
                status = backend_response.status.as_u16(),
                duration_ms = duration.as_millis(),
                "request completed"
            );

            let mut response = Response::new(Full::new(backend_response.body));
            *response.status_mut() = backend_response.status;
            *response.headers_mut() = backend_response.headers;
            Ok(response)
        }
        Err(e) => {
            warn!(
                request_id = %request_id,
                client = %client_addr,
                method = %method,
                uri = %uri,
                error = %e,
                "no viable backend for request"
            );
            Ok(error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()))
        }
    }
}

/// Add the standard proxy headers on the request headed upstream.
fn add_forwarding_headers(req: &mut ProxyRequest, client_addr: SocketAddr) {
    let client_ip = client_addr.ip().to_string();
    if let Ok(value) = client_ip.parse() {
        req.headers.insert("x-forwarded-for", value);
    }
    if let Ok(value) = client_ip.parse() {
        req.headers.insert("x-real-ip", value);
    }
}

/// Create a plain-text error response.
fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(format!(
        "{}: {}\n",
        status, message
    ))));
    *response.status_mut() = status;
    if let Ok(value) = "text/plain".parse() {
        response.headers_mut().insert("content-type", value);
    }
    response
}
