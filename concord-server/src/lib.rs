//! Concord HTTP server: NDJSON streaming of concordance queries behind a
//! per-client rate limiter and a bounded admission gate.

pub mod config;
pub mod http;

pub use config::{QuerySettings, ServerArgs};
pub use http::{router, AppState};
