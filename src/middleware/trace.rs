//! Request logging.
//!
//! Opens an `http_request` span carrying the correlation id, runs everything
//! downstream inside it, then logs one completion event with method, path,
//! client address, status and latency. Sits outside [`Recover`](super::Recover)
//! and [`Timeout`](super::Timeout) so their responses are logged too.

use std::time::Instant;

use tracing::{Instrument, info, info_span};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Trace {
    pub fn new() -> Self { Self }
}

impl Middleware for Trace {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let method = req.method().clone();
        let path = req.path().to_owned();
        let client = req.client_addr().map(|a| a.to_string()).unwrap_or_else(|| "-".to_owned());
        let request_id = req.request_id().map(|id| id.to_string()).unwrap_or_default();

        let span = info_span!("http_request", %request_id);
        Box::pin(
            async move {
                let started = Instant::now();
                let res = next.run(req).await;
                info!(
                    %method,
                    %path,
                    %client,
                    status = res.status_code().as_u16(),
                    latency_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "request completed",
                );
                res
            }
            .instrument(span),
        )
    }
}
