//! Keyword matching strategies
//!
//! A [`Matcher`] only finds raw occurrences. Turning those into [`Match`] records
//! (word-boundary filter + context windows) is shared by every strategy and lives
//! in [`concordance`].
//!
//! Two strategies:
//! - [`PatternMatcher`]: regex over the quoted keyword. Works for any keyword.
//! - [`VectorMatcher`]: AVX2 fixed-width compare, keywords up to 32 bytes.
//!   The last < 32 bytes of a document are never scanned.

pub mod vector;

use crate::interface::{ConcordError, ConcordResult, Match};
use crate::slicer::{extend_left, extend_right};
use regex::Regex;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

pub use vector::VectorMatcher;

/// Finds raw, non-overlapping keyword occurrences, left to right.
pub trait Matcher: Send + Sync {
    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Range<usize>> + 't>;

    fn name(&self) -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// PATTERN MATCHER
// ─────────────────────────────────────────────────────────────────────────────

/// General-purpose matcher built on `regex`.
///
/// `\b` is not part of the pattern: the word-boundary assertion is
/// very slow and is replaced by the byte check in [`concordance`]. Matching is
/// case sensitive; `(?i)` was measured as too slow for full-corpus scans.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(keyword: &str) -> ConcordResult<Self> {
        if keyword.is_empty() {
            return Err(ConcordError::InvalidKeyword("keyword is empty".to_string()));
        }
        let regex = Regex::new(&regex::escape(keyword))?;
        Ok(Self { regex })
    }
}

impl Matcher for PatternMatcher {
    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Range<usize>> + 't> {
        Box::new(self.regex.find_iter(text).map(|m| m.range()))
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SELECTION
// ─────────────────────────────────────────────────────────────────────────────

/// Which strategy to build. `Vector` and `Auto` fall back to the pattern matcher
/// when the CPU lacks AVX2 or the keyword is wider than the vector.
///
/// The default is `Pattern` because the vector matcher skips document tails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatcherKind {
    #[default]
    Pattern,
    Vector,
    Auto,
}

impl FromStr for MatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pattern" | "regex" => Ok(MatcherKind::Pattern),
            "vector" | "simd" => Ok(MatcherKind::Vector),
            "auto" => Ok(MatcherKind::Auto),
            other => Err(format!("unknown matcher '{}' (expected pattern, vector or auto)", other)),
        }
    }
}

/// Build the matcher for `keyword`. Fails only on an unusable keyword.
pub fn build_matcher(keyword: &str, kind: MatcherKind) -> ConcordResult<Arc<dyn Matcher>> {
    if keyword.is_empty() {
        return Err(ConcordError::InvalidKeyword("keyword is empty".to_string()));
    }

    if kind != MatcherKind::Pattern {
        match VectorMatcher::new(keyword) {
            Some(matcher) => return Ok(Arc::new(matcher)),
            None => tracing::debug!(
                keyword_len = keyword.len(),
                avx2 = vector::is_supported(),
                "vector matcher unavailable, using pattern matcher"
            ),
        }
    }

    Ok(Arc::new(PatternMatcher::new(keyword)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// CONCORDANCE
// ─────────────────────────────────────────────────────────────────────────────

/// ASCII letters only: a keyword next to "é" still counts as a whole word.
#[inline]
fn is_letter(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

/// A raw occurrence qualifies when neither neighbour byte is an ASCII letter.
#[inline]
pub fn is_word_bounded(text: &[u8], range: &Range<usize>) -> bool {
    let before_ok = range.start == 0 || !is_letter(text[range.start - 1]);
    let after_ok = range.end >= text.len() || !is_letter(text[range.end]);
    before_ok && after_ok
}

/// Lazily turn the matcher's raw hits in `text` into `Match` records.
pub fn concordance<'t>(
    matcher: &'t dyn Matcher,
    document_id: &'t str,
    text: &'t str,
    context_len: usize,
) -> impl Iterator<Item = Match> + 't {
    let bytes = text.as_bytes();
    matcher
        .find(text)
        .filter(move |range| is_word_bounded(bytes, range))
        .map(move |range| {
            let left_start = range.start.saturating_sub(context_len);
            let right_end = range.end.saturating_add(context_len).min(text.len());
            Match {
                document_id: document_id.to_string(),
                left_context: extend_left(text, range.start, left_start).to_string(),
                right_context: extend_right(text, range.end, right_end).to_string(),
            }
        })
}
