//! No-cache policy.
//!
//! Strips conditional request headers so a handler never answers
//! `304 Not Modified`, and marks every response as non-cacheable for
//! browsers and intermediaries.

use http::header::{
    CACHE_CONTROL, ETAG, EXPIRES, HeaderName, HeaderValue, IF_MATCH, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE, PRAGMA,
};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

const X_ACCEL_EXPIRES: HeaderName = HeaderName::from_static("x-accel-expires");

const CONDITIONAL_HEADERS: [HeaderName; 6] =
    [ETAG, IF_MODIFIED_SINCE, IF_MATCH, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE];

#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl NoCache {
    pub fn new() -> Self { Self }
}

impl Middleware for NoCache {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        for name in CONDITIONAL_HEADERS {
            req.headers_mut().remove(name);
        }

        Box::pin(async move {
            let mut res = next.run(req).await;
            let headers = res.headers_mut();
            headers.insert(
                CACHE_CONTROL,
                HeaderValue::from_static(
                    "no-cache, no-store, no-transform, must-revalidate, private, max-age=0",
                ),
            );
            headers.insert(EXPIRES, HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(X_ACCEL_EXPIRES, HeaderValue::from_static("0"));
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::handler::Handler;
    use crate::middleware::wrap;

    async fn conditional(req: Request) -> &'static str {
        if req.headers().contains_key(IF_NONE_MATCH) { "conditional" } else { "fresh" }
    }

    #[tokio::test]
    async fn strips_conditionals_and_sets_policy() {
        let stack: Vec<Arc<dyn Middleware>> = vec![Arc::new(NoCache::new())];
        let req = http::Request::builder()
            .header(IF_NONE_MATCH, "\"abc\"")
            .body(Bytes::new())
            .unwrap();

        let res = wrap(conditional.into_boxed_handler(), &stack).call(req.into()).await;

        assert_eq!(res.body(), b"fresh");
        assert!(res.headers()[CACHE_CONTROL].to_str().unwrap().contains("no-store"));
        assert_eq!(res.headers()[PRAGMA], "no-cache");
        assert_eq!(res.headers()["x-accel-expires"], "0");
        assert!(res.headers().contains_key(EXPIRES));
    }
}
