//! Panic recovery.
//!
//! A panic anywhere downstream becomes an empty `500 Internal Server Error`
//! for that request only. The connection task and every other in-flight
//! request are unaffected.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::error;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

#[derive(Clone, Copy, Debug, Default)]
pub struct Recover;

impl Recover {
    pub fn new() -> Self { Self }
}

impl Middleware for Recover {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin(async move {
            match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                Ok(res) => res,
                Err(panic) => {
                    error!(panic = panic_message(panic.as_ref()), "handler panicked");
                    Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
