//! Code-point safe context slicing
//!
//! Context windows are measured in bytes, so a tentative cut point can land in
//! the middle of a multi-byte character. These helpers move the cut outward to
//! the nearest boundary so the returned slice is always valid UTF-8.

/// Default number of context bytes on each side of a match
pub const CONTEXT_LENGTH: usize = 40;

/// Text between `candidate_start` (moved left to a code-point boundary) and `index`.
pub fn extend_left(text: &str, index: usize, candidate_start: usize) -> &str {
    let index = floor_boundary(text, index.min(text.len()));
    let mut start = candidate_start.min(index);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    &text[start..index]
}

/// Text between `index` and `candidate_end` (moved right to a code-point boundary).
pub fn extend_right(text: &str, index: usize, candidate_end: usize) -> &str {
    let index = floor_boundary(text, index.min(text.len()));
    let mut end = candidate_end.clamp(index, text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    &text[index..end]
}

/// `index` is expected to be a boundary already; this only guards misuse.
fn floor_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
