//! Per-request deadline.
//!
//! Races the downstream chain against a fixed duration. On expiry the
//! downstream future is dropped and `504 Gateway Timeout` is returned.
//!
//! Abandonment is cooperative: the future is dropped at its next yield
//! point. A handler that blocks the worker thread without awaiting cannot be
//! interrupted, and tasks it already spawned keep running.

use std::time::Duration;

use http::StatusCode;
use tracing::warn;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug)]
pub struct Timeout {
    limit: Duration,
}

impl Timeout {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl Default for Timeout {
    fn default() -> Self { Self::new(DEFAULT_TIMEOUT) }
}

impl Middleware for Timeout {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let limit = self.limit;
        Box::pin(async move {
            match tokio::time::timeout(limit, next.run(req)).await {
                Ok(res) => res,
                Err(_) => {
                    warn!(limit_ms = limit.as_millis() as u64, "request deadline exceeded");
                    Response::status(StatusCode::GATEWAY_TIMEOUT)
                }
            }
        })
    }
}
