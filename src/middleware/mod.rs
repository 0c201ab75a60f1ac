//! Middleware layer.
//!
//! Middleware intercepts a request on its way to a handler and the response
//! on its way back. Every interceptor implements one trait, [`Middleware`],
//! and receives the request plus a [`Next`] handle for the rest of the chain.
//! It may inspect or modify the request, short-circuit with its own
//! response, or call `next.run(req)` and decorate what comes back.
//!
//! Chains are composed once, at setup time, from the handler outward: the
//! last middleware in a list ends up closest to the handler. No list is
//! walked per request; each stage is a boxed handler holding the next.
//!
//! Built-in middleware, in the order the gateway pipeline installs them:
//!
//! | Middleware | Concern |
//! |---|---|
//! | [`SetRequestId`] | correlation id, `x-request-id` |
//! | [`RealIp`] | client address from proxy headers |
//! | [`Trace`] | per-request span and completion log |
//! | [`Recover`] | panic → 500 |
//! | [`Timeout`] | deadline → 504 |
//! | [`AllowContentType`] | request media type allow-list → 415 |
//! | [`NoCache`] | no-cache response headers |
//! | [`BearerAuth`] | API key gate for a route group |

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;

mod auth;
mod content_type;
mod no_cache;
mod real_ip;
mod recover;
mod request_id;
mod timeout;
mod trace;

pub use auth::{AuthError, BearerAuth, CredentialRegistry};
pub use content_type::AllowContentType;
pub use no_cache::NoCache;
pub use real_ip::RealIp;
pub use recover::Recover;
pub use request_id::{REQUEST_ID_HEADER, SetRequestId};
pub use timeout::Timeout;
pub use trace::Trace;

/// A request/response interceptor.
///
/// ```rust
/// use tollgate::middleware::{Middleware, Next};
/// use tollgate::{BoxFuture, Request};
///
/// struct Noop;
///
/// impl Middleware for Noop {
///     fn call(&self, req: Request, next: Next) -> BoxFuture {
///         Box::pin(next.run(req))
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

/// The remainder of the chain after the current middleware.
pub struct Next(BoxedHandler);

impl Next {
    /// Passes the request to the next stage and awaits its response.
    pub async fn run(self, req: Request) -> Response {
        self.0.call(req).await
    }
}

/// One middleware bound to the stage it wraps.
struct Layered {
    middleware: Arc<dyn Middleware>,
    inner: BoxedHandler,
}

impl ErasedHandler for Layered {
    fn call(&self, req: Request) -> BoxFuture {
        self.middleware.call(req, Next(Arc::clone(&self.inner)))
    }
}

/// Wraps `endpoint` in `stack`, first element outermost.
pub(crate) fn wrap(endpoint: BoxedHandler, stack: &[Arc<dyn Middleware>]) -> BoxedHandler {
    stack.iter().rev().fold(endpoint, |inner, middleware| {
        let layered: BoxedHandler = Arc::new(Layered { middleware: Arc::clone(middleware), inner });
        layered
    })
}
