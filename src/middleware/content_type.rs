//! Request media type allow-list.
//!
//! Requests that carry a body must declare one of the allowed media types or
//! get `415 Unsupported Media Type`. Parameters (`; charset=utf-8`) are
//! ignored and the comparison is case-insensitive. Bodyless requests pass.
//!
//! This is defence in depth against browsers submitting cross-origin
//! form-encoded bodies that a JSON API would otherwise try to interpret.

use std::sync::Arc;

use http::StatusCode;
use http::header::CONTENT_TYPE;
use tracing::debug;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

#[derive(Clone, Debug)]
pub struct AllowContentType {
    allowed: Arc<[String]>,
}

impl AllowContentType {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = types.into_iter().map(|t| t.as_ref().trim().to_ascii_lowercase()).collect();
        Self { allowed }
    }

    /// Accept `application/json` only.
    pub fn json() -> Self {
        Self::new(["application/json"])
    }

    fn permits(&self, req: &Request) -> bool {
        if req.body().is_empty() {
            return true;
        }
        let declared = req.header(CONTENT_TYPE.as_str()).unwrap_or_default();
        let media_type = declared.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        self.allowed.iter().any(|t| *t == media_type)
    }
}

impl Middleware for AllowContentType {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        if self.permits(&req) {
            return Box::pin(next.run(req));
        }
        debug!(content_type = req.header(CONTENT_TYPE.as_str()), "unsupported request content type");
        Box::pin(async { Response::status(StatusCode::UNSUPPORTED_MEDIA_TYPE) })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;

    use super::*;

    fn request(content_type: Option<&'static str>, body: &'static [u8]) -> Request {
        let mut builder = http::Request::builder().method("POST");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(Bytes::from_static(body)).unwrap().into()
    }

    #[rstest]
    #[case(None, b"", true)]
    #[case(Some("text/plain"), b"", true)]
    #[case(Some("application/json"), b"{}", true)]
    #[case(Some("Application/JSON; charset=utf-8"), b"{}", true)]
    #[case(Some("application/x-www-form-urlencoded"), b"test=test", false)]
    #[case(Some("application/json-patch+json"), b"[]", false)]
    #[case(None, b"{}", false)]
    fn checks_declared_media_type(
        #[case] content_type: Option<&'static str>,
        #[case] body: &'static [u8],
        #[case] permitted: bool,
    ) {
        assert_eq!(AllowContentType::json().permits(&request(content_type, body)), permitted);
    }
}
