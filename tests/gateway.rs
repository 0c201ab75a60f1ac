//! End-to-end behaviour of the gateway pipeline, driven in-process.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use rstest::rstest;
use tollgate::middleware::{BearerAuth, CredentialRegistry, REQUEST_ID_HEADER};
use tollgate::{PipelineConfig, Request, Response, Router, Service, StatusCode, routes};

const MISSING: &str = "Authorization header should include an API key";
const MALFORMED: &str =
    "Invalid Authorization header format. It should be in the format: Bearer $APITOKEN";
const UNKNOWN: &str = "An invalid API key was specified in the Authorization header";

fn registry() -> CredentialRegistry {
    CredentialRegistry::new([("ffd7bef1", "admin"), ("gae_98e8d5f4", "reguser")]).unwrap()
}

fn gateway() -> Service {
    routes::app(registry(), &PipelineConfig::default()).into_service()
}

fn get(path: &str, authorization: Option<&str>) -> Request {
    let mut builder = http::Request::builder().method("GET").uri(path);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    builder.body(Bytes::new()).unwrap().into()
}

fn body(res: &Response) -> &str {
    std::str::from_utf8(res.body()).unwrap()
}

#[tokio::test]
async fn public_health_needs_no_credentials() {
    let res = gateway().call(get("/api/v1/public/health", None)).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(body(&res), r#"{"alive": true}"#);
    assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn public_health_ignores_bad_credentials() {
    let res = gateway().call(get("/api/v1/public/health", Some("Bearer wrong-token"))).await;
    assert_eq!(res.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn registered_bearer_token_is_authorized() {
    let res = gateway().call(get("/api/v1/private/test", Some("Bearer ffd7bef1"))).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(body(&res), r#"{"authorized": true}"#);
    assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
}

#[rstest]
#[case(None, MISSING)]
#[case(Some(""), MISSING)]
#[case(Some("Bearer wrong-token"), UNKNOWN)]
#[case(Some("Token ffd7bef1"), MALFORMED)]
#[case(Some("ffd7bef1"), MALFORMED)]
#[case(Some("Bearer ffd7bef1 ffd7bef1"), MALFORMED)]
#[tokio::test]
async fn private_route_rejections(#[case] authorization: Option<&str>, #[case] expected: &str) {
    let res = gateway().call(get("/api/v1/private/test", authorization)).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&res), expected);
}

#[rstest]
#[case("GET", "/api/v1/private/nope")]
#[case("POST", "/api/v1/private/test")]
#[case("GET", "/api/v1/private")]
#[tokio::test]
async fn unmatched_private_paths_still_need_a_key(#[case] method: &str, #[case] path: &str) {
    let req = http::Request::builder().method(method).uri(path).body(Bytes::new()).unwrap();

    let res = gateway().call(req.into()).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&res), MISSING);
}

#[rstest]
#[case("GET", "/api/v1/private/nope", StatusCode::NOT_FOUND)]
#[case("POST", "/api/v1/private/test", StatusCode::METHOD_NOT_ALLOWED)]
#[tokio::test]
async fn authenticated_misses_get_404_and_405(
    #[case] method: &str,
    #[case] path: &str,
    #[case] expected: StatusCode,
) {
    let req = http::Request::builder()
        .method(method)
        .uri(path)
        .header(AUTHORIZATION, "Bearer ffd7bef1")
        .body(Bytes::new())
        .unwrap();

    let res = gateway().call(req.into()).await;
    assert_eq!(res.status_code(), expected);
}

#[tokio::test]
async fn unmatched_public_paths_are_plain_404() {
    let res = gateway().call(get("/api/v1/public/nope", None)).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_valid_requests_are_identical() {
    let svc = gateway();
    for _ in 0..5 {
        let res = svc.call(get("/api/v1/private/test", Some("Bearer gae_98e8d5f4"))).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(body(&res), r#"{"authorized": true}"#);
    }
}

#[tokio::test]
async fn valid_request_reaches_handler_exactly_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let handler = move |_req: Request| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { "counted" }
    };
    let svc = routes::pipeline(Router::new(), &PipelineConfig::default())
        .group(routes::PRIVATE_PREFIX, |g| g.layer(BearerAuth::new(registry())).get("/count", handler))
        .into_service();

    let res = svc.call(get("/api/v1/private/count", Some("Bearer ffd7bef1"))).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let res = svc.call(get("/api/v1/private/count", Some("Bearer nope"))).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handler_panic_is_isolated() {
    async fn explode(_req: Request) -> Response {
        panic!("boom");
    }

    let svc = routes::pipeline(Router::new(), &PipelineConfig::default())
        .group(routes::PRIVATE_PREFIX, |g| {
            g.layer(BearerAuth::new(registry())).get("/explode", explode).get("/test", routes::authorized)
        })
        .into_service();

    let res = svc.call(get("/api/v1/private/explode", Some("Bearer ffd7bef1"))).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().contains_key(REQUEST_ID_HEADER));

    let res = svc.call(get("/api/v1/private/test", Some("Bearer ffd7bef1"))).await;
    assert_eq!(res.status_code(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn slow_handler_times_out() {
    async fn stall(_req: Request) -> &'static str {
        tokio::time::sleep(Duration::from_secs(61)).await;
        "late"
    }

    let svc = routes::pipeline(Router::new(), &PipelineConfig::default())
        .group(routes::PUBLIC_PREFIX, |g| g.get("/stall", stall))
        .into_service();

    let res = svc.call(get("/api/v1/public/stall", None)).await;
    assert_eq!(res.status_code(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn form_encoded_body_is_rejected_before_auth() {
    let req = http::Request::builder()
        .method("POST")
        .uri("/api/v1/private/test")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(AUTHORIZATION, "Bearer ffd7bef1")
        .body(Bytes::from_static(b"test=test"))
        .unwrap();

    let res = gateway().call(req.into()).await;
    assert_eq!(res.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn every_response_is_uncacheable_and_tagged() {
    let svc = gateway();
    for req in [
        get("/api/v1/public/health", None),
        get("/api/v1/private/test", None),
        get("/nowhere", None),
    ] {
        let res = svc.call(req).await;
        assert!(res.headers()[CACHE_CONTROL].to_str().unwrap().contains("no-cache"));
        assert!(res.headers().contains_key(REQUEST_ID_HEADER));
    }
}

#[tokio::test]
async fn hardening_can_be_switched_off() {
    let config = PipelineConfig { require_json: false, no_cache: false, ..PipelineConfig::default() };
    let svc = routes::app(registry(), &config).into_service();

    let res = svc.call(get("/api/v1/public/health", None)).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert!(res.headers().get(CACHE_CONTROL).is_none());
}
