//! Per-request context.
//!
//! Every [`Request`](crate::Request) carries a [`Context`] that middleware
//! fills in as the request moves down the chain: the correlation id, the
//! client address and, behind the bearer gate, the resolved principal.
//!
//! Fields are written by the built-in middleware only. Handlers and custom
//! middleware read them. The correlation id is write-once: a second
//! assignment is ignored.

use std::fmt;
use std::net::IpAddr;

/// Correlation identifier attached to one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestId(String);

impl RequestId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity a valid credential resolves to, e.g. `admin`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Context {
    request_id: Option<RequestId>,
    client_addr: Option<IpAddr>,
    principal: Option<Principal>,
}

impl Context {
    pub(crate) fn with_peer(peer: Option<IpAddr>) -> Self {
        Self { client_addr: peer, ..Self::default() }
    }

    pub fn request_id(&self) -> Option<&RequestId> { self.request_id.as_ref() }
    pub fn client_addr(&self) -> Option<IpAddr> { self.client_addr }
    pub fn principal(&self) -> Option<&Principal> { self.principal.as_ref() }

    /// Returns `false` if an id was already assigned; the existing one wins.
    pub(crate) fn set_request_id(&mut self, id: RequestId) -> bool {
        if self.request_id.is_some() {
            return false;
        }
        self.request_id = Some(id);
        true
    }

    pub(crate) fn set_client_addr(&mut self, addr: IpAddr) {
        self.client_addr = Some(addr);
    }

    pub(crate) fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_write_once() {
        let mut ctx = Context::default();
        assert!(ctx.set_request_id(RequestId::new("first")));
        assert!(!ctx.set_request_id(RequestId::new("second")));
        assert_eq!(ctx.request_id().map(RequestId::as_str), Some("first"));
    }

    #[test]
    fn peer_address_seeds_client_addr() {
        let peer: IpAddr = "10.0.0.7".parse().unwrap();
        let ctx = Context::with_peer(Some(peer));
        assert_eq!(ctx.client_addr(), Some(peer));
        assert!(ctx.principal().is_none());
    }
}
