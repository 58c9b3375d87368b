//! Pattern matching for the string operators of the predicate language.
//!
//! # LIKE patterns
//!
//! Two wildcards:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//!
//! Every matcher operates on Unicode scalar values. The `_ci` variants
//! compare case-insensitively by lowercasing both sides first.

use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

/// Wildcard LIKE matching.
///
/// ```
/// use grantview_core::pattern_match::like;
/// assert!(like("/~/docs", "/~/*"));
/// assert!(like("alice", "?lice"));
/// assert!(!like("alice", "bob"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    like_recursive(&v, &p, 0, 0)
}

/// Case-insensitive [`like`].
pub fn like_ci(value: &str, pattern: &str) -> bool {
    like(&fold(value), &fold(pattern))
}

fn like_recursive(v: &[char], p: &[char], vi: usize, pi: usize) -> bool {
    if pi == p.len() {
        return vi == v.len();
    }
    match p[pi] {
        '*' => {
            for skip in vi..=v.len() {
                if like_recursive(v, p, skip, pi + 1) {
                    return true;
                }
            }
            false
        }
        '?' => vi < v.len() && like_recursive(v, p, vi + 1, pi + 1),
        ch => vi < v.len() && v[vi] == ch && like_recursive(v, p, vi + 1, pi + 1),
    }
}

/// Returns true if `value` starts with `prefix`, optionally ignoring case.
pub fn begins_with(value: &str, prefix: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        fold(value).starts_with(fold(prefix).as_str())
    } else {
        value.starts_with(prefix)
    }
}

/// Returns true if `value` ends with `suffix`, optionally ignoring case.
pub fn ends_with(value: &str, suffix: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        fold(value).ends_with(fold(suffix).as_str())
    } else {
        value.ends_with(suffix)
    }
}

/// Returns true if `value` contains `needle`, optionally ignoring case.
pub fn contains(value: &str, needle: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        fold(value).contains(fold(needle).as_str())
    } else {
        value.contains(needle)
    }
}

/// Orders two strings, optionally ignoring case.
pub fn compare(a: &str, b: &str, case_insensitive: bool) -> Ordering {
    if case_insensitive {
        fold(a).cmp(&fold(b))
    } else {
        a.cmp(b)
    }
}

fn fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}
