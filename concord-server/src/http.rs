//! HTTP transport for concordance queries
//!
//! Routes are mounted twice: production URLs live under `/concordance`, local
//! ones at the root.
//!
//! A query response is newline-delimited JSON. When the admission gate is full
//! the body starts with `{"status":"queued"}` and later `{"status":"ready"}`,
//! followed by one match object per line.

use crate::config::{QuerySettings, MAX_KEYWORD_LENGTH, MIN_KEYWORD_LENGTH};
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use concord::{
    build_matcher, cancel_after, stream_search_with, AdmissionController, AdmissionStatus,
    CancellationToken, Corpus, Matcher, RateLimiter, SearchOptions, StatusMessage,
    StreamStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const NDJSON: &str = "application/x-ndjson";
const SLOW_MODE_DELAY: Duration = Duration::from_millis(100);
/// Lines buffered between the query task and the response body
const LINE_BUFFER: usize = 64;
const UNKNOWN_IDENTITY: &str = "unknown";

#[derive(Clone)]
pub struct AppState {
    pub corpus: Arc<Corpus>,
    pub rate_limiter: Arc<RateLimiter>,
    pub admission: AdmissionController,
    pub settings: Arc<QuerySettings>,
}

pub fn router(state: AppState) -> Router {
    Router::<AppState>::new()
        .route("/concord", get(concord_handler))
        .route("/concordance/concord", get(concord_handler))
        .route("/manifest", get(manifest_handler))
        .route("/concordance/manifest", get(manifest_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ConcordParams {
    #[serde(default)]
    pub w: String,
}

pub async fn manifest_handler(State(st): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        st.corpus.manifest().to_vec(),
    )
        .into_response()
}

pub async fn concord_handler(
    State(st): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ConcordParams>,
) -> Response {
    let started = Instant::now();
    let keyword = params.w;

    if keyword.len() < MIN_KEYWORD_LENGTH {
        return bad_request(format!(
            "The keyword must be at least {} letters long.",
            MIN_KEYWORD_LENGTH
        ));
    }
    if keyword.len() > MAX_KEYWORD_LENGTH {
        return bad_request(format!(
            "The keyword cannot be longer than {} letters.",
            MAX_KEYWORD_LENGTH
        ));
    }

    // only clients behind the proxy carry an identity; the rest are not limited
    let identity = match headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        Some(ip) => {
            if !st.rate_limiter.admit(ip, started) {
                return StatusCode::TOO_MANY_REQUESTS.into_response();
            }
            ip.to_string()
        }
        None => UNKNOWN_IDENTITY.to_string(),
    };

    let matcher = match build_matcher(&keyword, st.settings.matcher) {
        Ok(matcher) => matcher,
        Err(e) => {
            tracing::error!(keyword = %keyword, error = %e, "failed to build matcher");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    let query = ConcordQuery {
        state: st,
        keyword,
        identity,
        matcher,
        started,
    };
    tokio::spawn(query.run(cancel.clone(), tx));

    // dropping the body (client gone) drops the guard and stops the query
    let guard = cancel.drop_guard();
    let lines = futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        rx.recv()
            .await
            .map(|line| (Ok::<_, Infallible>(line), (rx, guard)))
    });

    ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response()
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "message": message } })),
    )
        .into_response()
}

fn json_line<T: Serialize>(value: &T) -> Option<Bytes> {
    let mut line = serde_json::to_vec(value).ok()?;
    line.push(b'\n');
    Some(Bytes::from(line))
}

/// One admitted-or-queued query, run on its own task
struct ConcordQuery {
    state: AppState,
    keyword: String,
    identity: String,
    matcher: Arc<dyn Matcher>,
    started: Instant,
}

impl ConcordQuery {
    async fn run(self, cancel: CancellationToken, lines: mpsc::Sender<Bytes>) {
        let settings = Arc::clone(&self.state.settings);

        // the line channel is still empty here, so try_send cannot be refused for space
        let admitted = self
            .state
            .admission
            .admit(&cancel, |status| {
                let status = match status {
                    AdmissionStatus::Queued => StreamStatus::Queued,
                    AdmissionStatus::Admitted => StreamStatus::Ready,
                };
                if let Some(line) = json_line(&StatusMessage::new(status)) {
                    let _ = lines.try_send(line);
                }
            })
            .await;
        let permit = match admitted {
            Ok(permit) => permit,
            Err(e) => {
                tracing::debug!(keyword = %self.keyword, ip = %self.identity, error = %e, "client left while queued");
                return;
            }
        };

        // a child token so a deadline can be told apart from a disconnect
        let search_cancel = cancel.child_token();
        let deadline = settings
            .timeout
            .map(|timeout| cancel_after(search_cancel.clone(), timeout));

        let mut stream = stream_search_with(
            Arc::clone(&self.state.corpus),
            self.matcher,
            search_cancel.clone(),
            settings.workers,
            &SearchOptions::default(),
        );

        let mut results = 0usize;
        let mut timed_out = false;
        loop {
            // a fired deadline stops forwarding even if matches are still buffered
            let found = tokio::select! {
                biased;
                _ = search_cancel.cancelled() => {
                    timed_out = !cancel.is_cancelled();
                    break;
                }
                found = stream.recv() => match found {
                    Some(found) => found,
                    None => break,
                },
            };
            let Some(line) = json_line(&found) else { continue };
            if lines.send(line).await.is_err() {
                break;
            }
            results += 1;

            if settings.slow {
                tokio::select! {
                    biased;
                    _ = search_cancel.cancelled() => {
                        timed_out = !cancel.is_cancelled();
                        break;
                    }
                    _ = tokio::time::sleep(SLOW_MODE_DELAY) => {}
                }
            }
        }

        let summary = stream.finish().await;
        if let Some(deadline) = deadline {
            deadline.abort();
        }
        let was_queued = permit.was_queued();
        permit.release();

        tracing::info!(
            results,
            keyword = %self.keyword,
            duration_ms = self.started.elapsed().as_millis() as u64,
            ip = %self.identity,
            timed_out,
            queued = was_queued,
            workers = summary.workers,
            "concordance query finished"
        );
    }
}
