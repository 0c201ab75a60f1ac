//! The gateway application: global pipeline plus the public and private
//! route groups.
//!
//! Pipeline order, outermost first:
//!
//! ```text
//! SetRequestId → [RealIp] → Trace → Recover → Timeout → [AllowContentType] → [NoCache]
//!   → routing ─┬─ /api/v1/private/*  → BearerAuth → handler
//!              └─ /api/v1/public/*   →              handler
//! ```
//!
//! Bracketed stages are switched by [`PipelineConfig`].

use crate::config::PipelineConfig;
use crate::middleware::{
    AllowContentType, BearerAuth, CredentialRegistry, NoCache, RealIp, Recover, SetRequestId,
    Timeout, Trace,
};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

pub const PRIVATE_PREFIX: &str = "/api/v1/private";
pub const PUBLIC_PREFIX: &str = "/api/v1/public";

/// Installs the global middleware on `router` in pipeline order.
///
/// Call this before registering route groups so custom applications get the
/// same pipeline as [`app`].
pub fn pipeline(router: Router, config: &PipelineConfig) -> Router {
    let mut router = router.layer(SetRequestId::new());
    if config.trust_proxy_headers {
        router = router.layer(RealIp::new());
    }
    router = router
        .layer(Trace::new())
        .layer(Recover::new())
        .layer(Timeout::new(config.request_timeout));
    if config.require_json {
        router = router.layer(AllowContentType::json());
    }
    if config.no_cache {
        router = router.layer(NoCache::new());
    }
    router
}

/// The complete gateway: pipeline, gated private group, open public group.
pub fn app(registry: CredentialRegistry, config: &PipelineConfig) -> Router {
    pipeline(Router::new(), config)
        .group(PRIVATE_PREFIX, |g| g.layer(BearerAuth::new(registry)).get("/test", authorized))
        .group(PUBLIC_PREFIX, |g| g.get("/health", health))
}

/// `GET /api/v1/public/health`
pub async fn health(_req: Request) -> Response {
    Response::json(&br#"{"alive": true}"#[..])
}

/// `GET /api/v1/private/test`, reachable only past the bearer gate.
pub async fn authorized(_req: Request) -> Response {
    Response::json(&br#"{"authorized": true}"#[..])
}
