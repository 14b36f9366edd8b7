//! Glob-style matching for filter criteria.
//!
//! Supported syntax: literal bytes, `?` (exactly one byte) and `*` (zero or
//! more bytes).  A `*` skips forward to the first occurrence of the next
//! literal in the pattern; there is no backtracking.  Matches are anchored
//! at both ends and case-sensitive.

use crate::config::MAX_PATTERN_LENGTH;

/// Match `data` against `pattern`.
pub fn matches(data: &[u8], pattern: &str) -> bool {
    let pattern = pattern.as_bytes();
    let mut p = 0;
    let mut d = 0;

    while p < pattern.len() {
        match pattern[p] {
            b'*' => {
                // Fold the wildcard run; each `?` inside it still needs a byte.
                let mut reserved = 0;
                while p < pattern.len() && matches!(pattern[p], b'*' | b'?') {
                    if pattern[p] == b'?' {
                        reserved += 1;
                    }
                    p += 1;
                }
                if data.len() - d < reserved {
                    return false;
                }
                d += reserved;

                let Some(&literal) = pattern.get(p) else {
                    return true;
                };
                match data[d..].iter().position(|&b| b == literal) {
                    Some(offset) => d += offset,
                    None => return false,
                }
            }
            b'?' => {
                if d >= data.len() {
                    return false;
                }
                p += 1;
                d += 1;
            }
            literal => {
                if data.get(d) != Some(&literal) {
                    return false;
                }
                p += 1;
                d += 1;
            }
        }
    }

    d == data.len()
}

/// Check that a pattern is usable as a filter criterion.
pub fn validate(pattern: &str) -> bool {
    !pattern.is_empty()
        && pattern.len() < MAX_PATTERN_LENGTH
        && pattern
            .bytes()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, b'*' | b'?' | b':' | b'-' | b' '))
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
