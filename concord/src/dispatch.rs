//! Parallel search dispatcher
//!
//! Architecture:
//! - Workers run on the blocking pool (`spawn_blocking`) and scan whole documents.
//! - Every worker sends into one bounded channel. A full channel blocks the
//!   worker (`blocking_send`), so a slow consumer throttles the scan instead of
//!   losing matches.
//! - A supervisor task owns the last sender. It awaits every worker, then drops
//!   the sender, which closes the stream exactly once.
//!
//! Cancellation is cooperative: workers look at the token before each document
//! and after each sent match. A closed receiver stops them the same way.

use crate::cancel::CancellationToken;
use crate::corpus::Corpus;
use crate::interface::{ConcordResult, Match};
use crate::matcher::{build_matcher, concordance, Matcher, MatcherKind};
use crate::partition::{PartitionPlan, WorkerBudget};
use crate::slicer::CONTEXT_LENGTH;
use futures::Stream;
use std::ops::Range;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outstanding matches buffered between workers and the consumer
pub const OUTPUT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub matcher: MatcherKind,
    /// Context bytes on each side of a match
    pub context_len: usize,
    pub channel_capacity: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            matcher: MatcherKind::Pattern,
            context_len: CONTEXT_LENGTH,
            channel_capacity: OUTPUT_CAPACITY,
        }
    }
}

/// What the supervisor saw once every worker had returned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSummary {
    pub workers: usize,
    /// Workers that panicked
    pub worker_failures: usize,
    pub documents_scanned: usize,
    /// Documents whose text could not be read
    pub read_failures: usize,
    pub matches_sent: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

#[derive(Default)]
struct WorkerStats {
    documents_scanned: AtomicUsize,
    read_failures: AtomicUsize,
    matches_sent: AtomicUsize,
}

// ─────────────────────────────────────────────────────────────────────────────
// STREAM
// ─────────────────────────────────────────────────────────────────────────────

/// Matches in arrival order. Ends when every worker has returned; that is the
/// only completion signal, the cancellation token alone is not.
pub struct MatchStream {
    rx: mpsc::Receiver<Match>,
    supervisor: JoinHandle<SearchSummary>,
}

impl MatchStream {
    pub async fn recv(&mut self) -> Option<Match> {
        self.rx.recv().await
    }

    /// For consumers on a plain thread. Panics if called from async code.
    pub fn blocking_recv(&mut self) -> Option<Match> {
        self.rx.blocking_recv()
    }

    /// Stop receiving and wait for the supervisor. Workers still running see
    /// the closed channel on their next send and exit.
    pub async fn finish(self) -> SearchSummary {
        let MatchStream { rx, supervisor } = self;
        drop(rx);
        match supervisor.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "search supervisor failed");
                SearchSummary::default()
            }
        }
    }
}

impl Stream for MatchStream {
    type Item = Match;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Match>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DISPATCH
// ─────────────────────────────────────────────────────────────────────────────

/// Start a search for `keyword`. Fails before any work starts if the keyword
/// cannot be turned into a matcher. Must be called inside a Tokio runtime.
pub fn stream_search(
    corpus: Arc<Corpus>,
    keyword: &str,
    cancel: CancellationToken,
    budget: WorkerBudget,
    options: &SearchOptions,
) -> ConcordResult<MatchStream> {
    let matcher = build_matcher(keyword, options.matcher)?;
    Ok(stream_search_with(corpus, matcher, cancel, budget, options))
}

/// Same as [`stream_search`] with an already built matcher.
pub fn stream_search_with(
    corpus: Arc<Corpus>,
    matcher: Arc<dyn Matcher>,
    cancel: CancellationToken,
    budget: WorkerBudget,
    options: &SearchOptions,
) -> MatchStream {
    let started = Instant::now();
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    let stats = Arc::new(WorkerStats::default());

    let ranges: Vec<Range<usize>> = match budget.worker_count() {
        None => (0..corpus.len()).map(|i| i..i + 1).collect(),
        Some(n) => PartitionPlan::new(corpus.len(), n).ranges().to_vec(),
    };

    tracing::debug!(
        matcher = matcher.name(),
        budget = ?budget,
        workers = ranges.len(),
        documents = corpus.len(),
        "dispatching search"
    );

    let context_len = options.context_len;
    let handles: Vec<JoinHandle<()>> = ranges
        .into_iter()
        .map(|range| {
            let corpus = Arc::clone(&corpus);
            let matcher = Arc::clone(&matcher);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let stats = Arc::clone(&stats);
            tokio::task::spawn_blocking(move || {
                scan_range(&corpus, range, matcher.as_ref(), context_len, &tx, &cancel, &stats)
            })
        })
        .collect();

    let supervisor = tokio::spawn(supervise(handles, tx, stats, cancel, started));

    MatchStream { rx, supervisor }
}

/// Await all workers, then close the stream by dropping the last sender.
async fn supervise(
    handles: Vec<JoinHandle<()>>,
    tx: mpsc::Sender<Match>,
    stats: Arc<WorkerStats>,
    cancel: CancellationToken,
    started: Instant,
) -> SearchSummary {
    let workers = handles.len();
    let mut worker_failures = 0;

    for handle in handles {
        if let Err(e) = handle.await {
            worker_failures += 1;
            tracing::error!(error = %e, "search worker failed");
        }
    }

    drop(tx);

    let summary = SearchSummary {
        workers,
        worker_failures,
        documents_scanned: stats.documents_scanned.load(Ordering::Relaxed),
        read_failures: stats.read_failures.load(Ordering::Relaxed),
        matches_sent: stats.matches_sent.load(Ordering::Relaxed),
        cancelled: cancel.is_cancelled(),
        elapsed: started.elapsed(),
    };

    tracing::debug!(
        workers,
        matches = summary.matches_sent,
        cancelled = summary.cancelled,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "workers exited"
    );

    summary
}

/// Worker body: scan `range` of the corpus in order.
fn scan_range(
    corpus: &Corpus,
    range: Range<usize>,
    matcher: &dyn Matcher,
    context_len: usize,
    tx: &mpsc::Sender<Match>,
    cancel: &CancellationToken,
    stats: &WorkerStats,
) {
    #[cfg(feature = "perf-log")]
    let t0 = Instant::now();

    for document in &corpus.documents()[range] {
        if cancel.is_cancelled() || tx.is_closed() {
            break;
        }

        let text = match document.text() {
            Ok(text) => text,
            Err(e) => {
                stats.read_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(document = %document.id, error = %e, "skipping unreadable document");
                continue;
            }
        };
        stats.documents_scanned.fetch_add(1, Ordering::Relaxed);

        for found in concordance(matcher, &document.id, &text, context_len) {
            if tx.blocking_send(found).is_err() {
                return;
            }
            stats.matches_sent.fetch_add(1, Ordering::Relaxed);

            // checked after the send so a found match is never dropped
            if cancel.is_cancelled() {
                return;
            }
        }
    }

    #[cfg(feature = "perf-log")]
    eprintln!(
        "[perf] worker finished in {:.1}ms",
        t0.elapsed().as_secs_f64() * 1000.0
    );
}
