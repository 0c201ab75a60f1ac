//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Keep the grace period above the request timeout so a draining request is
//! never killed before the gateway itself gives up on it.
//!
//! # Request bodies
//!
//! Bodies are buffered before the middleware pipeline runs, so the server
//! bounds that read itself: more than [`max_body_bytes`](Server::max_body_bytes)
//! is answered with `413 Payload Too Large`, a body still incomplete after
//! [`body_timeout`](Server::body_timeout) with `408 Request Timeout`. A declared
//! `content-length` above the cap is refused before a single byte is read.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::{Router, Service};

/// The HTTP server. Plaintext HTTP/1.1 and HTTP/2; TLS belongs to the proxy
/// in front of it.
pub struct Server {
    addr: SocketAddr,
    max_body_bytes: usize,
    body_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use tollgate::Server;
    /// let server = Server::bind(([0, 0, 0, 0], 8080).into());
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        let defaults = PipelineConfig::default();
        Self { addr, max_body_bytes: defaults.max_body_bytes, body_timeout: defaults.request_timeout }
    }

    /// Largest request body accepted, in bytes.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Deadline for receiving the complete request body.
    pub fn body_timeout(mut self, timeout: Duration) -> Self {
        self.body_timeout = timeout;
        self
    }

    /// Serves `router` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    ///
    /// Fails with [`Error::Bind`] if the address cannot be bound.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve) with a caller-supplied shutdown signal.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| Error::Bind { addr: self.addr, source })?;
        let service = router.into_service();
        let limits = BodyLimits { max_bytes: self.max_body_bytes, timeout: self.body_timeout };

        info!(addr = %self.addr, "tollgate listening");

        // Tracks every connection task so shutdown can wait for them.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting immediately,
                // even with connections queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let service = service.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let service = service.clone();
                            async move { dispatch(service, req, peer, limits).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the JoinSet does not grow without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tollgate stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
struct BodyLimits {
    max_bytes: usize,
    timeout: Duration,
}

/// Buffers the body and runs one request through the service. Every failure
/// becomes a response, so hyper never sees an error.
async fn dispatch(
    service: Service,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
    limits: BodyLimits,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match read_body(body, limits).await {
        Ok(body) => body,
        Err(status) => {
            warn!(%peer, method = %parts.method, path = parts.uri.path(), %status, "request body refused");
            return Ok(Response::status(status).into_inner());
        }
    };

    let response = service.call(Request::new(parts, body, Some(peer.ip()))).await;
    Ok(response.into_inner())
}

/// Collects at most `limits.max_bytes` within `limits.timeout`.
async fn read_body<B>(body: B, limits: BodyLimits) -> Result<Bytes, StatusCode>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if body.size_hint().lower() > limits.max_bytes as u64 {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let collect = Limited::new(body, limits.max_bytes).collect();
    match tokio::time::timeout(limits.timeout, collect).await {
        Err(_) => Err(StatusCode::REQUEST_TIMEOUT),
        Ok(Ok(collected)) => Ok(collected.to_bytes()),
        Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(StatusCode::PAYLOAD_TOO_LARGE)
        }
        Ok(Err(e)) => {
            warn!("failed to read request body: {e}");
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only
/// Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use hyper::body::Frame;

    use super::*;

    const LIMITS: BodyLimits = BodyLimits { max_bytes: 1024, timeout: Duration::from_secs(60) };

    /// Streams 512-byte chunks forever without announcing a length.
    struct Endless;

    impl Body for Endless {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(&[0; 512])))))
        }
    }

    /// A client that never sends its body.
    struct Stalled;

    impl Body for Stalled {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn body_within_limit_is_buffered() {
        let body = read_body(Full::new(Bytes::from_static(b"{}")), LIMITS).await;
        assert_eq!(body.unwrap(), Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn declared_oversized_body_is_413() {
        let body = read_body(Full::new(Bytes::from(vec![0u8; 2048])), LIMITS).await;
        assert_eq!(body, Err(StatusCode::PAYLOAD_TOO_LARGE));
    }

    #[tokio::test]
    async fn streamed_oversized_body_is_413() {
        assert_eq!(read_body(Endless, LIMITS).await, Err(StatusCode::PAYLOAD_TOO_LARGE));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body_is_408() {
        assert_eq!(read_body(Stalled, LIMITS).await, Err(StatusCode::REQUEST_TIMEOUT));
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        let result = Server::bind(addr)
            .serve_with_shutdown(Router::new(), std::future::ready(()))
            .await;

        match result {
            Err(Error::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let result = Server::bind("127.0.0.1:0".parse().unwrap())
            .serve_with_shutdown(Router::new(), std::future::ready(()))
            .await;
        assert!(result.is_ok());
    }
}
