//! Correlation id assignment.
//!
//! Runs first in the pipeline so every later log line can carry the id.
//! A well-formed inbound `x-request-id` (set by a fronting proxy) is kept;
//! otherwise a UUID v4 is generated. The id is echoed on the response.

use http::header::{HeaderName, HeaderValue};
use uuid::Uuid;

use super::{Middleware, Next};
use crate::context::RequestId;
use crate::handler::BoxFuture;
use crate::request::Request;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_INBOUND_LEN: usize = 128;

#[derive(Clone, Copy, Debug, Default)]
pub struct SetRequestId;

impl SetRequestId {
    pub fn new() -> Self { Self }
}

impl Middleware for SetRequestId {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let id = inbound_id(&req).unwrap_or_else(|| Uuid::new_v4().to_string());
        req.context_mut().set_request_id(RequestId::new(id));

        Box::pin(async move {
            let echo = req
                .request_id()
                .and_then(|id| HeaderValue::from_str(id.as_str()).ok());
            let mut res = next.run(req).await;
            if let Some(value) = echo {
                res.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            res
        })
    }
}

fn inbound_id(req: &Request) -> Option<String> {
    let value = req.header(REQUEST_ID_HEADER.as_str())?.trim();
    if value.is_empty() || value.len() > MAX_INBOUND_LEN {
        return None;
    }
    Some(value.to_owned())
}
