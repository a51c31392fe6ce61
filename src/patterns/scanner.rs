//! Byte-pattern search algorithms.
//!
//! Four algorithms, increasing in preprocessing cost and best-case speed: naive, Boyer-Moore-
//! Horspool, Turbo-BM and Raita. All but Turbo-BM honor wildcard positions in the pattern;
//! Turbo-BM's inner comparison loop does not check the mask and is only correct for fully strict
//! patterns (`Pattern::is_strict`).

use super::pattern::Pattern;

fn byte_matches(pattern: &Pattern, index: usize, byte: u8) -> bool {
    !pattern.mask()[index] || pattern.bytes()[index] == byte
}

/// A single matching algorithm over a haystack buffer.
pub trait Scanner {
    /// Returns the offset of the first match at or after `from`, if any.
    fn find(&self, haystack: &[u8], pattern: &Pattern, from: usize) -> Option<usize>;
}

/// Textbook O(n*m) scan. No preprocessing; always correct, including wildcards.
pub struct Naive;

impl Scanner for Naive {
    fn find(&self, haystack: &[u8], pattern: &Pattern, from: usize) -> Option<usize> {
        let m = pattern.len();
        if m == 0 || haystack.len() < m {
            return None;
        }

        for start in from..=haystack.len() - m {
            if (0..m).all(|i| byte_matches(pattern, i, haystack[start + i])) {
                return Some(start);
            }
        }
        None
    }
}

/// Boyer-Moore-Horspool: right-to-left comparison with a 256-entry bad-character skip table.
/// Wildcard positions are excluded when building the table, so the skip is always sound even
/// though the comparison itself honors wildcards.
pub struct BoyerMooreHorspool;

impl BoyerMooreHorspool {
    fn skip_table(pattern: &Pattern) -> [usize; 256] {
        let m = pattern.len();
        let mut table = [m; 256];
        for i in 0..m.saturating_sub(1) {
            if pattern.mask()[i] {
                table[pattern.bytes()[i] as usize] = m - 1 - i;
            }
        }
        table
    }
}

impl Scanner for BoyerMooreHorspool {
    fn find(&self, haystack: &[u8], pattern: &Pattern, from: usize) -> Option<usize> {
        let m = pattern.len();
        if m == 0 || haystack.len() < m {
            return None;
        }

        let table = Self::skip_table(pattern);
        let mut start = from;

        while start <= haystack.len() - m {
            let mut i = m - 1;
            loop {
                if !byte_matches(pattern, i, haystack[start + i]) {
                    break;
                }
                if i == 0 {
                    return Some(start);
                }
                i -= 1;
            }
            let last = haystack[start + m - 1];
            start += table[last as usize].max(1);
        }
        None
    }
}

/// Turbo Boyer-Moore: Horspool plus a turbo-shift that remembers the length of the matching
/// suffix from the previous attempt to skip past factors that cannot repeat.
///
/// Only defined for fully strict patterns: the inner comparison loop checks raw bytes, not the
/// mask, mirroring the upstream algorithm it is ported from.
pub struct TurboBoyerMoore;

impl Scanner for TurboBoyerMoore {
    fn find(&self, haystack: &[u8], pattern: &Pattern, from: usize) -> Option<usize> {
        let m = pattern.len();
        if m == 0 || haystack.len() < m {
            return None;
        }
        debug_assert!(
            pattern.is_strict(),
            "TurboBoyerMoore is only defined for fully strict patterns"
        );

        let table = BoyerMooreHorspool::skip_table(pattern);
        let bytes = pattern.bytes();

        let mut start = from;
        let mut shift = m;
        let mut turbo_shift = 0usize;

        while start <= haystack.len() - m {
            let mut i = m - 1;
            let mut matched_len = 0usize;

            while i < m && bytes[i] == haystack[start + i] {
                if i == 0 {
                    return Some(start);
                }
                i -= 1;
                matched_len += 1;
            }

            let last = haystack[start + m - 1];
            let horspool_shift = table[last as usize].max(1);

            // Only update the turbo-shift bookkeeping when a suffix actually matched
            // (`matched_len > 0`, i.e. `i < m - 1`); an immediate mismatch at the last byte
            // carries no information about a repeated factor and must not poison the next
            // round's shift, mirroring the `i < pattern.size - 1` guard in the upstream
            // `tbm_t::operator()`.
            if matched_len > 0 {
                let turbo = if matched_len == turbo_shift { 1 } else { 0 };
                shift = horspool_shift.max(turbo_shift.saturating_sub(turbo)).max(1);
                turbo_shift = m - matched_len;
            } else {
                shift = horspool_shift;
                turbo_shift = 0;
            }

            start += shift;
        }
        None
    }
}

/// Raita: checks the last byte, then the first byte, then the middle byte before walking the
/// rest of the pattern. Cheap rejections on typical text/code haystacks.
pub struct Raita;

impl Scanner for Raita {
    fn find(&self, haystack: &[u8], pattern: &Pattern, from: usize) -> Option<usize> {
        let m = pattern.len();
        if m == 0 || haystack.len() < m {
            return None;
        }
        if m == 1 {
            return (from..haystack.len()).find(|&i| byte_matches(pattern, 0, haystack[i]));
        }

        let mid = m / 2;

        for start in from..=haystack.len() - m {
            if !byte_matches(pattern, m - 1, haystack[start + m - 1]) {
                continue;
            }
            if !byte_matches(pattern, 0, haystack[start]) {
                continue;
            }
            if !byte_matches(pattern, mid, haystack[start + mid]) {
                continue;
            }
            if (1..m - 1).all(|i| i == mid || byte_matches(pattern, i, haystack[start + i])) {
                return Some(start);
            }
        }
        None
    }
}

/// Picks the best-fitting algorithm for a pattern: Turbo-BM for strict patterns, Raita
/// otherwise, falling back to the naive scanner for single-byte patterns where preprocessing
/// buys nothing.
pub fn default_scanner(pattern: &Pattern) -> Box<dyn Scanner + Send + Sync> {
    if pattern.len() <= 1 {
        Box::new(Naive)
    } else if pattern.is_strict() {
        Box::new(TurboBoyerMoore)
    } else {
        Box::new(Raita)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn haystack() -> Vec<u8> {
        b"\x00\x01\xA1\xBB\xCC\xB2\x00\xA1\xFF\xCC\xB2\x00".to_vec()
    }

    #[test]
    fn naive_finds_strict_pattern() {
        let p = Pattern::from_text("A1 BB CC B2").unwrap();
        assert_eq!(Naive.find(&haystack(), &p, 0), Some(2));
    }

    #[test]
    fn naive_finds_wildcard_pattern() {
        let p = Pattern::from_text("A1 ? ?? B2").unwrap();
        assert_eq!(Naive.find(&haystack(), &p, 0), Some(2));
    }

    #[test]
    fn naive_resumes_from_offset() {
        let p = Pattern::from_text("A1 ? ?? B2").unwrap();
        let h = haystack();
        let first = Naive.find(&h, &p, 0).unwrap();
        assert_eq!(Naive.find(&h, &p, first + 1), Some(7));
    }

    #[test]
    fn bmh_matches_naive_on_wildcards() {
        let p = Pattern::from_text("A1 ? ?? B2").unwrap();
        let h = haystack();
        assert_eq!(BoyerMooreHorspool.find(&h, &p, 0), Naive.find(&h, &p, 0));
    }

    #[test]
    fn turbo_bm_matches_naive_on_strict_pattern() {
        let p = Pattern::from_text("A1 BB CC B2").unwrap();
        let h = haystack();
        assert_eq!(TurboBoyerMoore.find(&h, &p, 0), Naive.find(&h, &p, 0));
    }

    #[test]
    fn turbo_bm_finds_match_preceded_by_a_repeated_factor() {
        // A repeated-prefix pattern against a haystack with a run of the repeated byte: an
        // immediate last-byte mismatch must not leave stale turbo-shift state that skips past
        // the real match later in the scan.
        let p = Pattern::from_text("41 41 41 42").unwrap();
        let h = b"AAAAAAB".to_vec();
        assert_eq!(TurboBoyerMoore.find(&h, &p, 0), Some(3));
        assert_eq!(TurboBoyerMoore.find(&h, &p, 0), Naive.find(&h, &p, 0));
    }

    #[test]
    fn raita_matches_naive_on_wildcards() {
        let p = Pattern::from_text("A1 ? ?? B2").unwrap();
        let h = haystack();
        assert_eq!(Raita.find(&h, &p, 0), Naive.find(&h, &p, 0));
    }

    #[test]
    fn no_match_returns_none() {
        let p = Pattern::from_text("FF FF FF FF").unwrap();
        let h = haystack();
        assert_eq!(Naive.find(&h, &p, 0), None);
        assert_eq!(BoyerMooreHorspool.find(&h, &p, 0), None);
        assert_eq!(Raita.find(&h, &p, 0), None);
    }

    #[test]
    fn default_scanner_picks_turbo_bm_for_strict() {
        let p = Pattern::from_text("A1 BB CC B2").unwrap();
        assert!(p.is_strict());
        let h = haystack();
        assert_eq!(default_scanner(&p).find(&h, &p, 0), Some(2));
    }

    #[test]
    fn default_scanner_picks_raita_for_wildcard() {
        let p = Pattern::from_text("A1 ? ?? B2").unwrap();
        let h = haystack();
        assert_eq!(default_scanner(&p).find(&h, &p, 0), Some(2));
    }
}
