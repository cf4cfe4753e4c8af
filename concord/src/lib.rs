//! Concord - streaming keyword-in-context search
//!
//! Scans an in-memory corpus for whole-word occurrences of a keyword and
//! streams each hit with its left and right context as soon as a worker finds
//! it. Around the search core sit a per-client rate limiter and a bounded
//! admission gate with a queued/ready signal.

pub mod admission;
pub mod cancel;
pub mod corpus;
pub mod dispatch;
pub mod interface;
pub mod matcher;
pub mod partition;
pub mod ratelimit;
pub mod slicer;

pub use admission::{AdmissionController, AdmissionHandle, AdmissionStatus, WouldBlock};
pub use cancel::{cancel_after, CancellationToken, DropGuard};
pub use corpus::{Corpus, Document, LoadOptions};
pub use dispatch::{stream_search, stream_search_with, MatchStream, SearchOptions, SearchSummary};
pub use interface::*;
pub use matcher::{build_matcher, Matcher, MatcherKind};
pub use partition::{PartitionPlan, WorkerBudget};
pub use ratelimit::{RateLimitConfig, RateLimiter};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber for a binary. `RUST_LOG` overrides
/// the default `info` level. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
