//! Corpus partitioning for fixed-size worker pools

use std::num::NonZeroUsize;
use std::ops::Range;
use std::str::FromStr;

/// How many workers a search may use.
///
/// The integer form used on the command line is `-1` for [`WorkerBudget::Unbounded`],
/// `0` for [`WorkerBudget::Auto`] and `n > 0` for [`WorkerBudget::Fixed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerBudget {
    /// One worker per document
    #[default]
    Unbounded,
    /// One worker per available CPU
    Auto,
    Fixed(NonZeroUsize),
}

impl WorkerBudget {
    pub fn from_sentinel(value: i64) -> Option<Self> {
        match value {
            -1 => Some(WorkerBudget::Unbounded),
            0 => Some(WorkerBudget::Auto),
            n if n > 0 => NonZeroUsize::new(n as usize).map(WorkerBudget::Fixed),
            _ => None,
        }
    }

    /// Worker count for a partitioned search. `None` for unbounded.
    pub fn worker_count(&self) -> Option<usize> {
        match self {
            WorkerBudget::Unbounded => None,
            WorkerBudget::Auto => Some(
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4),
            ),
            WorkerBudget::Fixed(n) => Some(n.get()),
        }
    }
}

impl FromStr for WorkerBudget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unbounded" => Ok(WorkerBudget::Unbounded),
            "auto" => Ok(WorkerBudget::Auto),
            other => other
                .parse::<i64>()
                .ok()
                .and_then(WorkerBudget::from_sentinel)
                .ok_or_else(|| format!("invalid worker budget '{}' (expected -1, 0, a positive count, unbounded or auto)", s)),
        }
    }
}

/// Contiguous document ranges, one per worker.
///
/// Each range has `document_count / workers` documents and the last one also
/// takes the remainder, so every worker runs even on an uneven split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    ranges: Vec<Range<usize>>,
}

impl PartitionPlan {
    pub fn new(document_count: usize, requested_workers: usize) -> Self {
        let workers = document_count.min(requested_workers.max(1));
        if workers == 0 {
            return Self { ranges: Vec::new() };
        }

        let range_len = document_count / workers;
        let ranges = (0..workers)
            .map(|i| {
                let start = i * range_len;
                let end = if i == workers - 1 {
                    document_count
                } else {
                    start + range_len
                };
                start..end
            })
            .collect();

        Self { ranges }
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn workers(&self) -> usize {
        self.ranges.len()
    }
}
