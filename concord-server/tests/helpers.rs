use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use concord::{AdmissionController, Corpus, Document, RateLimitConfig, RateLimiter};
use concord_server::{router, AppState, QuerySettings};
use std::sync::Arc;
use tower::ServiceExt;

pub fn sample_corpus() -> Corpus {
    Corpus::from_documents(vec![
        Document::new("moby-dick", "Call me Ishmael. Whenever I find myself growing grim about the mouth, I quietly take to the ocean."),
        Document::new("odyssey", "Sing to me of the man, Muse, driven over the wine-dark ocean time and again."),
        Document::new("walden", "I went to the woods because I wished to live deliberately."),
    ])
    .with_manifest(br#"[{"id":"moby-dick"},{"id":"odyssey"},{"id":"walden"}]"#.to_vec())
}

pub fn make_state(capacity: usize, rate_limit: RateLimitConfig) -> AppState {
    AppState {
        corpus: Arc::new(sample_corpus()),
        rate_limiter: Arc::new(RateLimiter::new(rate_limit)),
        admission: AdmissionController::new(capacity),
        settings: Arc::new(QuerySettings::default()),
    }
}

pub fn make_router() -> Router {
    router(make_state(4, RateLimitConfig::default()))
}

pub async fn get(app: Router, uri: &str, ip: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().uri(uri);
    if let Some(ip) = ip {
        request = request.header("X-Real-IP", ip);
    }
    app.oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_lines(response: Response<Body>) -> Vec<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    bytes
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).unwrap())
        .collect()
}
