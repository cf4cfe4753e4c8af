//! Run one concordance query against a corpus directory and report timings
//!
//! Run with: cargo run --release --bin concord-bench -- --directory data --query ocean

use anyhow::{bail, Context, Result};
use clap::Parser;
use concord::{
    cancel_after, stream_search, CancellationToken, Corpus, LoadOptions, MatcherKind,
    PartitionPlan, SearchOptions, WorkerBudget,
};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Corpus directory (one subdirectory per document plus manifest.json)
    #[arg(short, long)]
    directory: PathBuf,

    /// Keyword to search for
    #[arg(short, long)]
    query: Option<String>,

    /// Worker budget: -1 for one per document, 0 for one per CPU, or a count
    #[arg(short, long, default_value = "-1", allow_hyphen_values = true)]
    workers: WorkerBudget,

    /// Matching strategy: pattern, vector or auto
    #[arg(short, long, default_value = "pattern")]
    matcher: MatcherKind,

    /// Print this many results (-1 for all, 0 for none)
    #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
    results: i64,

    /// Cancel the query after this many milliseconds (-1 to disable)
    #[arg(short, long, default_value_t = 1000, allow_hyphen_values = true)]
    timeout_ms: i64,

    /// Count the letter 'a' across the corpus instead of searching
    #[arg(long)]
    measure_baseline: bool,

    /// Read document texts from disk during the scan
    #[arg(long)]
    lazy: bool,

    /// Only load this many documents
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    concord::init_tracing();
    let args = Args::parse();

    let options = LoadOptions {
        lazy: args.lazy,
        limit: args.limit,
    };
    let corpus = Corpus::load(&args.directory, &options)
        .with_context(|| format!("Failed to load corpus from {}", args.directory.display()))?;
    let corpus = Arc::new(corpus);

    if args.measure_baseline {
        run_baseline(&corpus, args.workers);
        return Ok(());
    }

    let Some(query) = args.query.as_deref() else {
        bail!("--query is required unless --measure-baseline is set");
    };
    run_query(corpus, query, &args).await
}

async fn run_query(corpus: Arc<Corpus>, query: &str, args: &Args) -> Result<()> {
    let started = Instant::now();
    let cancel = CancellationToken::new();
    if args.timeout_ms >= 0 {
        cancel_after(cancel.clone(), Duration::from_millis(args.timeout_ms as u64));
    }

    let options = SearchOptions {
        matcher: args.matcher,
        ..SearchOptions::default()
    };
    let mut stream = stream_search(corpus, query, cancel.clone(), args.workers, &options)
        .context("Failed to start search")?;

    let mut first: Option<Duration> = None;
    let mut count: i64 = 0;
    while let Some(found) = stream.recv().await {
        first.get_or_insert_with(|| started.elapsed());
        if args.results < 0 || count < args.results {
            println!("{}", serde_json::to_string(&found)?);
        }
        count += 1;
    }
    let last = started.elapsed();
    let summary = stream.finish().await;
    cancel.cancel();

    tracing::debug!(
        workers = summary.workers,
        documents = summary.documents_scanned,
        cancelled = summary.cancelled,
        "search finished"
    );

    let first_ms = first.map(|d| d.as_millis() as i64).unwrap_or(-1);
    println!("results: {}", count);
    println!("first:   {:>6} ms", first_ms);
    println!("last:    {:>6} ms", last.as_millis());
    Ok(())
}

/// Same fan-out as a search but with a trivial per-document workload, to
/// separate scheduling cost from matching cost.
fn run_baseline(corpus: &Corpus, budget: WorkerBudget) {
    let started = Instant::now();
    let documents = corpus.documents();

    let total: usize = match budget.worker_count() {
        None => documents.par_iter().map(count_letter_a).sum(),
        Some(1) => documents.iter().map(count_letter_a).sum(),
        Some(n) => PartitionPlan::new(documents.len(), n)
            .ranges()
            .par_iter()
            .map(|range| documents[range.clone()].iter().map(count_letter_a).sum::<usize>())
            .sum(),
    };

    println!("result:   {}", total);
    println!("duration: {} ms", started.elapsed().as_millis());
}

fn count_letter_a(document: &concord::Document) -> usize {
    match document.text() {
        Ok(text) => text.bytes().filter(|&b| b == b'a').count(),
        Err(e) => {
            tracing::warn!(document = %document.id, error = %e, "skipping unreadable document");
            0
        }
    }
}
