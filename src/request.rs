//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::IpAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

use crate::context::{Context, Principal, RequestId};

/// An incoming HTTP request with its body fully buffered.
pub struct Request {
    pub(crate) parts: http::request::Parts,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) context: Context,
}

impl Request {
    pub(crate) fn new(parts: http::request::Parts, body: Bytes, peer: Option<IpAddr>) -> Self {
        Self { parts, body, params: HashMap::new(), context: Context::with_peer(peer) }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn context(&self) -> &Context { &self.context }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.parts.headers }
    pub(crate) fn context_mut(&mut self) -> &mut Context { &mut self.context }

    /// Case-insensitive header lookup. Values that are not visible ASCII
    /// are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn request_id(&self) -> Option<&RequestId> { self.context.request_id() }
    pub fn client_addr(&self) -> Option<IpAddr> { self.context.client_addr() }
    pub fn principal(&self) -> Option<&Principal> { self.context.principal() }
}

/// Builds a request without a socket peer. Used to drive a
/// [`Service`](crate::Service) in-process.
impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body, None)
    }
}
