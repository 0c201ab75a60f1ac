//! Radix-tree request router with middleware and route groups.
//!
//! One tree per HTTP method, O(path-length) lookup. Middleware attaches at
//! two levels:
//!
//! - **global** ([`Router::layer`]) wraps routing itself, so it runs for every
//!   request, including ones that end in 404 or 405;
//! - **group** ([`Group::layer`]) wraps the handlers registered in that
//!   group, and the group's own 404/405 fallback. A request under the prefix
//!   that matches no route still passes the group middleware before it is
//!   told the route does not exist.
//!
//! Both chains are composed once in [`Router::into_service`] and
//! [`Router::group`]. Nothing is assembled per request.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::middleware::{self, Middleware};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
///
/// ```rust
/// use tollgate::{Request, Response, Router};
/// use tollgate::middleware::{BearerAuth, CredentialRegistry, SetRequestId};
///
/// # fn build(registry: CredentialRegistry) -> Router {
/// Router::new()
///     .layer(SetRequestId::new())
///     .group("/api/v1/private", |g| g.layer(BearerAuth::new(registry)).get("/test", test))
///     .group("/api/v1/public", |g| g.get("/health", health))
/// # }
/// # async fn test(_: Request) -> Response { Response::text("") }
/// # async fn health(_: Request) -> Response { Response::text("") }
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    fallbacks: Vec<(String, BoxedHandler)>,
    layers: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), fallbacks: Vec::new(), layers: Vec::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax and are read with `req.param("name")`.
    ///
    /// # Panics
    ///
    /// Panics if the path is invalid or conflicts with an existing route.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.insert(method, path, handler.into_boxed_handler())
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Append a global middleware. The first one added is the outermost.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Register a group of routes under `prefix` sharing their own
    /// middleware, inserted between routing and the group's handlers.
    ///
    /// # Panics
    ///
    /// Same as [`Router::on`], for every route in the group.
    pub fn group(mut self, prefix: &str, build: impl FnOnce(Group) -> Group) -> Self {
        let group = build(Group::new(prefix));
        for (method, path, handler) in group.routes {
            let handler = middleware::wrap(handler, &group.layers);
            self = self.insert(method, &path, handler);
        }
        let fallback = middleware::wrap(unmatched.into_boxed_handler(), &group.layers);
        self.fallbacks.push((group.prefix, fallback));
        self
    }

    /// Finalize routing and wrap it in the global middleware.
    pub fn into_service(mut self) -> Service {
        // Longest prefix first so nested prefixes pick the innermost group.
        self.fallbacks.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let endpoint: BoxedHandler =
            Arc::new(Endpoint { routes: self.routes, fallbacks: self.fallbacks });
        Service { chain: middleware::wrap(endpoint, &self.layers) }
    }

    fn insert(mut self, method: Method, path: &str, handler: BoxedHandler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// Routes sharing a path prefix and a middleware list. Built inside
/// [`Router::group`]; the order of `layer` and route calls does not matter.
pub struct Group {
    prefix: String,
    layers: Vec<Arc<dyn Middleware>>,
    routes: Vec<(Method, String, BoxedHandler)>,
}

impl Group {
    fn new(prefix: &str) -> Self {
        Self { prefix: prefix.trim_end_matches('/').to_owned(), layers: Vec::new(), routes: Vec::new() }
    }

    /// Append a group middleware. The first one added is the outermost.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let path = format!("{}/{}", self.prefix, path.trim_start_matches('/'));
        self.routes.push((method, path, handler.into_boxed_handler()));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// A finalized router: global middleware around route dispatch.
///
/// Cheap to clone and shared across connections. Also the entry point for
/// driving the application in-process, without a socket.
#[derive(Clone)]
pub struct Service {
    chain: BoxedHandler,
}

impl Service {
    pub async fn call(&self, req: Request) -> Response {
        self.chain.call(req).await
    }
}

/// Innermost stage of the global chain: route lookup and dispatch.
struct Endpoint {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    fallbacks: Vec<(String, BoxedHandler)>,
}

/// Miss status handed from [`Endpoint`] to a group fallback.
#[derive(Clone, Copy)]
struct Unmatched(StatusCode);

/// Group fallback handler: answers with the status routing decided on.
async fn unmatched(req: Request) -> Response {
    let status = req.parts.extensions.get::<Unmatched>().map_or(StatusCode::NOT_FOUND, |u| u.0);
    Response::status(status)
}

impl Endpoint {
    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
        Some((Arc::clone(matched.value), params))
    }

    fn path_known(&self, path: &str) -> bool {
        self.routes.values().any(|tree| tree.at(path).is_ok())
    }

    fn fallback(&self, path: &str) -> Option<&BoxedHandler> {
        self.fallbacks
            .iter()
            .find(|(prefix, _)| {
                path.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .map(|(_, handler)| handler)
    }
}

impl ErasedHandler for Endpoint {
    fn call(&self, mut req: Request) -> BoxFuture {
        if let Some((handler, params)) = self.lookup(req.method(), req.path()) {
            req.params = params;
            return handler.call(req);
        }
        let status = if self.path_known(req.path()) {
            StatusCode::METHOD_NOT_ALLOWED
        } else {
            StatusCode::NOT_FOUND
        };
        match self.fallback(req.path()) {
            Some(fallback) => {
                req.parts.extensions.insert(Unmatched(status));
                fallback.call(req)
            }
            None => Box::pin(async move { Response::status(status) }),
        }
    }
}
