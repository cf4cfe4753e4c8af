//! End-to-end tests for the search dispatcher: every worker policy, stream
//! closure under cancellation, backpressure and per-document failures.

use concord::{
    stream_search, stream_search_with, CancellationToken, Corpus, Document, LoadOptions, Match,
    MatchStream, Matcher, SearchOptions, SearchSummary, WorkerBudget,
};
use futures::StreamExt;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fixed(n: usize) -> WorkerBudget {
    WorkerBudget::Fixed(NonZeroUsize::new(n).unwrap())
}

/// Document `i` holds `i % 5` numbered occurrences of "ocean" plus some near misses.
fn sea_corpus(documents: usize) -> Arc<Corpus> {
    let documents = (0..documents)
        .map(|i| {
            let mut text = String::from("oceanic oceans; ");
            for j in 0..i % 5 {
                text.push_str(&format!("the ocean #{} rolls. ", j));
            }
            Document::new(format!("doc-{:03}", i), text)
        })
        .collect();
    Arc::new(Corpus::from_documents(documents))
}

/// `documents` documents with `per_document` matches each
fn dense_corpus(documents: usize, per_document: usize) -> Arc<Corpus> {
    let text = "word ".repeat(per_document);
    let documents = (0..documents)
        .map(|i| Document::new(format!("dense-{}", i), text.clone()))
        .collect();
    Arc::new(Corpus::from_documents(documents))
}

async fn drain(mut stream: MatchStream) -> (Vec<Match>, SearchSummary) {
    let mut found = Vec::new();
    while let Some(m) = stream.recv().await {
        found.push(m);
    }
    (found, stream.finish().await)
}

fn sorted(mut found: Vec<Match>) -> Vec<(String, String, String)> {
    let mut keys: Vec<_> = found
        .drain(..)
        .map(|m| (m.document_id, m.left_context, m.right_context))
        .collect();
    keys.sort();
    keys
}

// ============================================================
// Policies
// ============================================================

#[tokio::test]
async fn test_all_policies_find_the_same_matches() {
    let corpus = sea_corpus(37);
    let budgets = [
        WorkerBudget::Unbounded,
        WorkerBudget::Auto,
        fixed(1),
        fixed(3),
        fixed(8),
        fixed(500),
    ];

    let mut results = Vec::new();
    for budget in budgets {
        let stream = stream_search(
            Arc::clone(&corpus),
            "ocean",
            CancellationToken::new(),
            budget,
            &SearchOptions::default(),
        )
        .unwrap();
        let (found, summary) = drain(stream).await;
        assert_eq!(summary.documents_scanned, 37, "budget {:?}", budget);
        assert_eq!(summary.worker_failures, 0);
        results.push(sorted(found));
    }

    // 37 documents cycle through 0..5 occurrences: 7 full cycles of 10 plus 0+1
    assert_eq!(results[0].len(), 71);
    for other in &results[1..] {
        assert_eq!(&results[0], other);
    }
}

#[tokio::test]
async fn test_worker_counts_per_policy() {
    let corpus = sea_corpus(10);
    for (budget, workers) in [(WorkerBudget::Unbounded, 10), (fixed(4), 4), (fixed(64), 10)] {
        let stream = stream_search(
            Arc::clone(&corpus),
            "ocean",
            CancellationToken::new(),
            budget,
            &SearchOptions::default(),
        )
        .unwrap();
        let (_, summary) = drain(stream).await;
        assert_eq!(summary.workers, workers, "budget {:?}", budget);
    }
}

#[tokio::test]
async fn test_matches_within_a_document_keep_position_order() {
    let corpus = sea_corpus(20);
    let stream = stream_search(
        corpus,
        "ocean",
        CancellationToken::new(),
        fixed(3),
        &SearchOptions::default(),
    )
    .unwrap();
    let (found, _) = drain(stream).await;

    let mut last_seen: std::collections::HashMap<String, usize> = Default::default();
    for m in found {
        let number: usize = m.right_context[2..].split(' ').next().unwrap().parse().unwrap();
        if let Some(previous) = last_seen.insert(m.document_id.clone(), number) {
            assert!(number > previous, "{} out of order", m.document_id);
        }
    }
}

#[tokio::test]
async fn test_stream_trait_collects_everything() {
    let stream = stream_search(
        sea_corpus(10),
        "ocean",
        CancellationToken::new(),
        WorkerBudget::Auto,
        &SearchOptions::default(),
    )
    .unwrap();
    let found: Vec<Match> = stream.collect().await;
    assert_eq!(found.len(), 20);
}

#[test]
fn test_blocking_recv_from_plain_thread() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let stream = {
        let _enter = rt.enter();
        stream_search(
            sea_corpus(10),
            "ocean",
            CancellationToken::new(),
            fixed(2),
            &SearchOptions::default(),
        )
        .unwrap()
    };

    let consumer = std::thread::spawn(move || {
        let mut stream = stream;
        let mut count = 0usize;
        while stream.blocking_recv().is_some() {
            count += 1;
        }
        (count, stream)
    });
    let (count, stream) = consumer.join().unwrap();
    assert_eq!(count, 20);

    let summary = rt.block_on(stream.finish());
    assert_eq!(summary.matches_sent, 20);
    assert!(!summary.cancelled);
}

// ============================================================
// Termination
// ============================================================

#[tokio::test]
async fn test_cancel_mid_scan_still_closes_stream() {
    for budget in [WorkerBudget::Unbounded, WorkerBudget::Auto, fixed(2)] {
        let cancel = CancellationToken::new();
        let options = SearchOptions {
            channel_capacity: 1,
            ..Default::default()
        };
        let mut stream = stream_search(dense_corpus(16, 500), "word", cancel.clone(), budget, &options)
            .unwrap();

        let mut received = 0;
        while received < 5 {
            stream.recv().await.unwrap();
            received += 1;
        }
        cancel.cancel();

        let drained = tokio::time::timeout(Duration::from_secs(10), async {
            while stream.recv().await.is_some() {
                received += 1;
            }
        })
        .await;
        assert!(drained.is_ok(), "stream never closed for {:?}", budget);

        let summary = stream.finish().await;
        assert!(summary.cancelled);
        assert!(received < 16 * 500);
        assert_eq!(summary.matches_sent, received);
    }
}

#[tokio::test]
async fn test_finish_without_draining_stops_workers() {
    let options = SearchOptions {
        channel_capacity: 1,
        ..Default::default()
    };
    let stream = stream_search(
        dense_corpus(8, 1000),
        "word",
        CancellationToken::new(),
        WorkerBudget::Unbounded,
        &options,
    )
    .unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(10), stream.finish())
        .await
        .expect("workers kept running after the receiver was dropped");
    assert!(summary.matches_sent < 8 * 1000);
}

#[tokio::test]
async fn test_backpressure_loses_nothing() {
    let options = SearchOptions {
        channel_capacity: 1,
        ..Default::default()
    };
    let mut stream = stream_search(
        dense_corpus(4, 50),
        "word",
        CancellationToken::new(),
        WorkerBudget::Unbounded,
        &options,
    )
    .unwrap();

    let mut received = 0;
    while stream.recv().await.is_some() {
        received += 1;
        if received % 20 == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
    assert_eq!(received, 200);
    assert_eq!(stream.finish().await.matches_sent, 200);
}

struct PanickingMatcher;

impl Matcher for PanickingMatcher {
    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Range<usize>> + 't> {
        if text.contains("boom") {
            panic!("matcher failure");
        }
        Box::new(text.match_indices("ocean").map(|(i, s)| i..i + s.len()))
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

#[tokio::test]
async fn test_worker_panic_does_not_block_closure() {
    let corpus = Arc::new(Corpus::from_documents(vec![
        Document::new("a", "the ocean"),
        Document::new("b", "boom"),
        Document::new("c", "an ocean here"),
    ]));

    let stream = stream_search_with(
        corpus,
        Arc::new(PanickingMatcher),
        CancellationToken::new(),
        WorkerBudget::Unbounded,
        &SearchOptions::default(),
    );
    let (found, summary) = drain(stream).await;

    assert_eq!(summary.worker_failures, 1);
    assert_eq!(found.len(), 2);
}

// ============================================================
// Corpus
// ============================================================

#[tokio::test]
async fn test_unreadable_lazy_document_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let corpus = Arc::new(Corpus::from_documents(vec![
        Document::new("present", "an ocean view"),
        Document::lazy("missing", dir.path().join("missing").join("merged.txt")),
    ]));

    let stream = stream_search(
        corpus,
        "ocean",
        CancellationToken::new(),
        WorkerBudget::Unbounded,
        &SearchOptions::default(),
    )
    .unwrap();
    let (found, summary) = drain(stream).await;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].document_id, "present");
    assert_eq!(summary.read_failures, 1);
    assert_eq!(summary.documents_scanned, 1);
}

#[tokio::test]
async fn test_search_loaded_directory() {
    let dir = TempDir::new().unwrap();
    for (id, text) in [("moby", "Call me Ishmael. The ocean called."), ("odyssey", "wine-dark sea")] {
        std::fs::create_dir(dir.path().join(id)).unwrap();
        std::fs::write(dir.path().join(id).join("merged.txt"), text).unwrap();
    }
    std::fs::write(dir.path().join("manifest.json"), "[]").unwrap();

    for lazy in [false, true] {
        let options = LoadOptions { lazy, limit: None };
        let corpus = Arc::new(Corpus::load(dir.path(), &options).unwrap());
        let stream = stream_search(
            corpus,
            "ocean",
            CancellationToken::new(),
            WorkerBudget::Auto,
            &SearchOptions::default(),
        )
        .unwrap();
        let (found, _) = drain(stream).await;

        assert_eq!(
            found,
            vec![Match {
                document_id: "moby".to_string(),
                left_context: "Call me Ishmael. The ".to_string(),
                right_context: " called.".to_string(),
            }]
        );
    }
}
