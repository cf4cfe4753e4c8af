//! Concord public types
//!
//! Records shared between the search core, the HTTP transport and the bench CLI.
//! The wire names (`filename`, `left`, `right`, `status`) are fixed by the
//! frontend and must not change.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// One qualifying keyword occurrence with its surrounding context.
///
/// `left_context` ends right before the keyword and `right_context` starts right
/// after it. Both are whole code-point sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    #[serde(rename = "filename")]
    pub document_id: String,
    #[serde(rename = "left")]
    pub left_context: String,
    #[serde(rename = "right")]
    pub right_context: String,
}

/// Two-phase admission signal sent ahead of the match stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Queued,
    Ready,
}

/// Status line written on the NDJSON stream: `{"status":"queued"}`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusMessage {
    pub status: StreamStatus,
}

impl StatusMessage {
    pub fn new(status: StreamStatus) -> Self {
        Self { status }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Error type for concordance operations
#[derive(Debug, Error)]
pub enum ConcordError {
    /// The keyword cannot be turned into a matcher. Reported before any scan starts.
    #[error("Invalid keyword: {0}")]
    InvalidKeyword(String),
    /// The caller's context was cancelled while waiting for a slot.
    #[error("Operation cancelled")]
    Cancelled,
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Manifest error: {0}")]
    Manifest(String),
}

impl ConcordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConcordError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ConcordResult<T> = Result<T, ConcordError>;

impl From<regex::Error> for ConcordError {
    fn from(e: regex::Error) -> Self {
        ConcordError::InvalidKeyword(e.to_string())
    }
}
