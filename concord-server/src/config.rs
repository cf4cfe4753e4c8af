//! Server configuration: command-line flags with `CONCORD_*` environment fallbacks

use clap::Parser;
use concord::{LoadOptions, MatcherKind, RateLimitConfig, WorkerBudget};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Shortest keyword accepted, in bytes
pub const MIN_KEYWORD_LENGTH: usize = 4;
/// Longest keyword accepted, in bytes
pub const MAX_KEYWORD_LENGTH: usize = 30;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Streaming concordance search server", long_about = None)]
pub struct ServerArgs {
    /// Corpus directory (one subdirectory per document plus manifest.json)
    #[arg(short, long, env = "CONCORD_DIRECTORY")]
    pub directory: PathBuf,

    /// Listen on this port
    #[arg(short, long, env = "CONCORD_PORT")]
    pub port: u16,

    #[arg(long, env = "CONCORD_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Sleep 100 ms after every streamed line
    #[arg(long, env = "CONCORD_SLOW")]
    pub slow: bool,

    /// Stop searching after this many milliseconds (-1 to disable)
    #[arg(long, env = "CONCORD_TIMEOUT_MS", default_value_t = 1000, allow_hyphen_values = true)]
    pub timeout_ms: i64,

    /// Searches allowed to run at once
    #[arg(long, env = "CONCORD_MAX_CONCURRENT", default_value_t = 4)]
    pub max_concurrent: usize,

    /// Requests allowed per client within the rate limit interval
    #[arg(long, env = "CONCORD_RATE_LIMIT_REQUESTS", default_value_t = 10)]
    pub rate_limit_requests: usize,

    /// Rate limit interval in seconds
    #[arg(long, env = "CONCORD_RATE_LIMIT_INTERVAL_SECS", default_value_t = 10)]
    pub rate_limit_interval_secs: u64,

    /// How long a client that went over the limit is refused, in seconds
    #[arg(long, env = "CONCORD_RATE_LIMIT_PENALTY_SECS", default_value_t = 60)]
    pub rate_limit_penalty_secs: u64,

    /// Worker budget: -1 for one per document, 0 for one per CPU, or a count
    #[arg(long, env = "CONCORD_WORKERS", default_value = "-1", allow_hyphen_values = true)]
    pub workers: WorkerBudget,

    /// Matching strategy: pattern, vector or auto
    #[arg(long, env = "CONCORD_MATCHER", default_value = "pattern")]
    pub matcher: MatcherKind,

    /// Read document texts from disk during each scan
    #[arg(long, env = "CONCORD_LAZY")]
    pub lazy: bool,

    /// Only load this many documents
    #[arg(long, env = "CONCORD_LIMIT")]
    pub limit: Option<usize>,
}

impl ServerArgs {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        Ok(addr.parse()?)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            lazy: self.lazy,
            limit: self.limit,
        }
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_requests,
            window: Duration::from_secs(self.rate_limit_interval_secs),
            penalty: Duration::from_secs(self.rate_limit_penalty_secs),
        }
    }

    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            slow: self.slow,
            timeout: u64::try_from(self.timeout_ms).ok().map(Duration::from_millis),
            workers: self.workers,
            matcher: self.matcher,
        }
    }
}

/// Per-query behaviour shared by every request
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub slow: bool,
    /// `None` disables the deadline
    pub timeout: Option<Duration>,
    pub workers: WorkerBudget,
    pub matcher: MatcherKind,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            slow: false,
            timeout: Some(Duration::from_millis(1000)),
            workers: WorkerBudget::Unbounded,
            matcher: MatcherKind::Pattern,
        }
    }
}
