//! Client address from proxy headers.
//!
//! Only install this behind a proxy or load balancer that overwrites these
//! headers. Exposed directly, any client can claim any address.
//!
//! Precedence: `True-Client-IP`, `X-Real-IP`, then the left-most entry of
//! `X-Forwarded-For`. A value that does not parse as an IP address is ignored
//! and the socket peer address stays in place.

use std::net::IpAddr;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

const TRUE_CLIENT_IP: &str = "true-client-ip";
const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Clone, Copy, Debug, Default)]
pub struct RealIp;

impl RealIp {
    pub fn new() -> Self { Self }
}

impl Middleware for RealIp {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        if let Some(addr) = forwarded_addr(&req) {
            req.context_mut().set_client_addr(addr);
        }
        Box::pin(next.run(req))
    }
}

fn forwarded_addr(req: &Request) -> Option<IpAddr> {
    let raw = req
        .header(TRUE_CLIENT_IP)
        .or_else(|| req.header(X_REAL_IP))
        .or_else(|| req.header(X_FORWARDED_FOR).and_then(|v| v.split(',').next()))?;
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;

    use super::*;

    fn request(headers: &[(&'static str, &'static str)]) -> Request {
        let mut builder = http::Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::new()).unwrap().into()
    }

    #[rstest]
    #[case(&[], None)]
    #[case(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")], Some("203.0.113.9"))]
    #[case(&[("x-real-ip", "198.51.100.4"), ("x-forwarded-for", "203.0.113.9")], Some("198.51.100.4"))]
    #[case(&[("true-client-ip", "2001:db8::1"), ("x-real-ip", "198.51.100.4")], Some("2001:db8::1"))]
    #[case(&[("x-real-ip", "not-an-ip")], None)]
    fn resolves_by_precedence(
        #[case] headers: &[(&'static str, &'static str)],
        #[case] expected: Option<&str>,
    ) {
        let expected = expected.map(|s| s.parse::<IpAddr>().unwrap());
        assert_eq!(forwarded_addr(&request(headers)), expected);
    }
}
