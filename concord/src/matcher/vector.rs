//! Fixed-width vector matcher
//!
//! The keyword is zero-padded to one 256-bit lane together with a byte mask.
//! At every offset the next 32 text bytes are XORed with the keyword, masked and
//! tested for zero. The scan advances one byte at a time and stops once fewer
//! than 32 bytes remain, so a keyword in the last 31 bytes of a document is not
//! reported.

use super::Matcher;
use std::ops::Range;

/// Bytes compared per step
pub const LANES: usize = 32;

/// True when this CPU can run the vector matcher
pub fn is_supported() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

/// Exact substring matcher using AVX2 compares
#[derive(Debug, Clone)]
pub struct VectorMatcher {
    keyword: [u8; LANES],
    mask: [u8; LANES],
    keyword_len: usize,
}

impl VectorMatcher {
    /// `None` when the keyword is empty, wider than a lane, or AVX2 is missing.
    pub fn new(keyword: &str) -> Option<Self> {
        let bytes = keyword.as_bytes();
        if bytes.is_empty() || bytes.len() > LANES || !is_supported() {
            return None;
        }

        let mut padded = [0u8; LANES];
        let mut mask = [0u8; LANES];
        padded[..bytes.len()].copy_from_slice(bytes);
        mask[..bytes.len()].fill(0xFF);

        Some(Self {
            keyword: padded,
            mask,
            keyword_len: bytes.len(),
        })
    }

    /// First offset `>= offset` where the keyword starts, if any.
    pub fn search(&self, text: &[u8], offset: usize) -> Option<usize> {
        if text.len() < LANES || offset > text.len() - LANES {
            return None;
        }

        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: `new` only succeeds when AVX2 was detected at runtime.
            unsafe { search_avx2(text, &self.keyword, &self.mask, offset) }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            None
        }
    }
}

impl Matcher for VectorMatcher {
    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Range<usize>> + 't> {
        let bytes = text.as_bytes();
        let mut offset = 0;
        Box::new(std::iter::from_fn(move || {
            let start = self.search(bytes, offset)?;
            let end = start + self.keyword_len;
            // resume after the hit so raw hits never overlap
            offset = end;
            Some(start..end)
        }))
    }

    fn name(&self) -> &'static str {
        "vector"
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn search_avx2(
    text: &[u8],
    keyword: &[u8; LANES],
    mask: &[u8; LANES],
    offset: usize,
) -> Option<usize> {
    use std::arch::x86_64::*;

    let keyword_v = _mm256_loadu_si256(keyword.as_ptr() as *const __m256i);
    let mask_v = _mm256_loadu_si256(mask.as_ptr() as *const __m256i);

    let last = text.len() - LANES;
    let mut i = offset;
    while i <= last {
        let text_v = _mm256_loadu_si256(text.as_ptr().add(i) as *const __m256i);
        let diff = _mm256_and_si256(_mm256_xor_si256(text_v, keyword_v), mask_v);
        if _mm256_testz_si256(diff, diff) != 0 {
            return Some(i);
        }
        i += 1;
    }
    None
}
