//! Optimal fuzzy subsequence matching
//!
//! Scores a query against a candidate by filling a score matrix over the
//! window between the first occurrence of the first query character and the
//! last occurrence of the last one, then walking the matrix back to recover
//! the matched positions.
//!
//! Each cell `H[i][j]` holds the best score for aligning `query[..=i]` with
//! `query[i]` at or before column `j`; `C[i][j]` holds the length of the
//! consecutive run ending in a match at `(i, j)`.

use super::charclass::{
    bonus_for, CharClass, BONUS_BOUNDARY, BONUS_CONSECUTIVE, BONUS_FIRST_CHAR_MULTIPLIER,
    SCORE_GAP_EXTENSION, SCORE_GAP_START, SCORE_MATCH,
};
use serde::{Deserialize, Serialize};

/// Case sensitivity applied to one filter request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMatching {
    Sensitive,
    Insensitive,
}

impl CaseMatching {
    /// Smart case: insensitive unless the query contains an upper-case character
    pub fn smart(query: &str) -> Self {
        if query.to_lowercase() == query {
            CaseMatching::Insensitive
        } else {
            CaseMatching::Sensitive
        }
    }

    pub fn is_sensitive(self) -> bool {
        self == CaseMatching::Sensitive
    }
}

/// A successful match: score and the character indices that matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchScore {
    pub score: i32,
    /// 0-based character (not byte) indices into the candidate, ascending
    pub positions: Vec<usize>,
}

/// Match `query` against `candidate`.
///
/// Returns `None` when the query is not a subsequence of the candidate. An
/// empty query matches everything with score 0 and no positions.
pub fn fuzzy_match(query: &str, candidate: &str, case: CaseMatching) -> Option<MatchScore> {
    let sensitive = case.is_sensitive();
    let pattern: Vec<char> = query
        .chars()
        .map(|c| if sensitive { c } else { fold_case(c) })
        .collect();
    let m = pattern.len();

    if m == 0 {
        return Some(MatchScore {
            score: 0,
            positions: Vec::new(),
        });
    }

    // Cheap rejection before any allocation proportional to the candidate
    if query.is_ascii() && candidate.is_ascii() {
        let needle: Vec<u8> = pattern.iter().map(|&c| c as u8).collect();
        if !is_ascii_subsequence(&needle, candidate.as_bytes(), sensitive) {
            return None;
        }
    }

    let text: Vec<char> = candidate.chars().collect();
    let n = text.len();
    if m > n {
        return None;
    }

    // Normalized text and per-position bonus
    let mut folded = Vec::with_capacity(n);
    let mut bonus = Vec::with_capacity(n);
    let mut prev_class = CharClass::INITIAL;
    for &c in &text {
        let class = CharClass::of(c);
        if !sensitive && class == CharClass::Upper {
            folded.push(fold_case(c));
        } else {
            folded.push(c);
        }
        bonus.push(bonus_for(prev_class, class));
        prev_class = class;
    }

    // Earliest column each query character can occupy
    let mut first = Vec::with_capacity(m);
    for (col, &c) in folded.iter().enumerate() {
        if c == pattern[first.len()] {
            first.push(col);
            if first.len() == m {
                break;
            }
        }
    }
    if first.len() < m {
        return None;
    }

    let last_char = pattern[m - 1];
    let last_idx = folded[first[m - 1]..]
        .iter()
        .rposition(|&c| c == last_char)
        .map(|p| p + first[m - 1])?;

    let f0 = first[0];
    let width = last_idx - f0 + 1;
    let mut h = vec![0i32; width * m];
    let mut cons = vec![0i32; width * m];

    let mut max_score = 0;
    let mut max_pos = f0;

    // First row
    let mut prev_h = 0;
    let mut in_gap = false;
    for col in f0..=last_idx {
        let off = col - f0;
        if folded[col] == pattern[0] {
            let score = SCORE_MATCH + bonus[col] * BONUS_FIRST_CHAR_MULTIPLIER;
            h[off] = score;
            cons[off] = 1;
            if m == 1 && score > max_score {
                max_score = score;
                max_pos = col;
                if bonus[col] >= BONUS_BOUNDARY {
                    break;
                }
            }
            in_gap = false;
        } else {
            let penalty = if in_gap { SCORE_GAP_EXTENSION } else { SCORE_GAP_START };
            h[off] = (prev_h + penalty).max(0);
            cons[off] = 0;
            in_gap = true;
        }
        prev_h = h[off];
    }

    if m == 1 {
        return Some(MatchScore {
            score: max_score,
            positions: vec![max_pos],
        });
    }

    // Remaining rows. Cells left of first[i] stay zero, which is what the
    // leftmost live cell of each row needs as its left neighbour.
    for (i, &f) in first.iter().enumerate().skip(1) {
        let pchar = pattern[i];
        let row = i * width;
        let mut in_gap = false;

        for col in f..=last_idx {
            let off = col - f0;
            let left = h[row + off - 1];
            let diag = h[row - width + off - 1];
            let diag_cons = cons[row - width + off - 1];

            let s2 = left + if in_gap { SCORE_GAP_EXTENSION } else { SCORE_GAP_START };
            let mut s1 = 0;
            let mut consecutive = 0;

            if folded[col] == pchar {
                s1 = diag + SCORE_MATCH;
                let mut b = bonus[col];
                consecutive = diag_cons + 1;
                if consecutive > 1 {
                    let run_bonus = bonus[col + 1 - consecutive as usize];
                    // A strong boundary inside a run starts a new run
                    if b >= BONUS_BOUNDARY && b > run_bonus {
                        consecutive = 1;
                    } else {
                        b = b.max(BONUS_CONSECUTIVE.max(run_bonus));
                    }
                }
                if s1 + b < s2 {
                    s1 += bonus[col];
                    consecutive = 0;
                } else {
                    s1 += b;
                }
            }

            cons[row + off] = consecutive;
            in_gap = s1 < s2;
            let score = s1.max(s2).max(0);
            if i == m - 1 && score > max_score {
                max_score = score;
                max_pos = col;
            }
            h[row + off] = score;
        }
    }

    let positions = backtrace(&h, &cons, &first, f0, width, max_pos);

    Some(MatchScore {
        score: max_score,
        positions,
    })
}

/// Walk from the best cell of the last row back to the first row
fn backtrace(h: &[i32], cons: &[i32], first: &[usize], f0: usize, width: usize, end: usize) -> Vec<usize> {
    let m = first.len();
    let mut positions = Vec::with_capacity(m);
    let mut i = m - 1;
    let mut j = end;
    let mut prefer_match = true;

    loop {
        let row = i * width;
        let j0 = j - f0;
        let s = h[row + j0];

        let s1 = if i > 0 && j >= first[i] {
            h[row - width + j0 - 1]
        } else {
            0
        };
        let s2 = if j > first[i] { h[row + j0 - 1] } else { 0 };

        if s > s1 && (s > s2 || (s == s2 && prefer_match)) {
            positions.push(j);
            if i == 0 {
                break;
            }
            i -= 1;
        }

        let below = row + width + j0 + 1;
        prefer_match = cons[row + j0] > 1 || (below < cons.len() && cons[below] > 0);
        j -= 1;
    }

    positions.reverse();
    positions
}

/// Lower-case a single character, leaving multi-char expansions untouched
pub(crate) fn fold_case(c: char) -> char {
    if c.is_ascii() {
        return c.to_ascii_lowercase();
    }
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Subsequence check over ASCII bytes using memchr
fn is_ascii_subsequence(needle: &[u8], haystack: &[u8], sensitive: bool) -> bool {
    let mut from = 0;
    for &b in needle {
        let rest = &haystack[from..];
        let hit = if !sensitive && b.is_ascii_lowercase() {
            memchr::memchr2(b, b.to_ascii_uppercase(), rest)
        } else {
            memchr::memchr(b, rest)
        };
        match hit {
            Some(i) => from += i + 1,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smart(query: &str, candidate: &str) -> Option<MatchScore> {
        fuzzy_match(query, candidate, CaseMatching::smart(query))
    }

    fn spelled(candidate: &str, positions: &[usize]) -> String {
        let chars: Vec<char> = candidate.chars().collect();
        positions.iter().map(|&p| chars[p]).collect()
    }

    #[test]
    fn test_prefix_match_score() {
        let m = smart("abc", "ABC123").unwrap();
        assert_eq!(m.positions, vec![0, 1, 2]);
        // 3 matches, doubled start-of-string bonus, two consecutive chars
        // inheriting that bonus
        assert_eq!(m.score, 88);
    }

    #[test]
    fn test_smart_case() {
        assert!(smart("abc", "ABC123").is_some());
        assert!(smart("Abc", "abc123").is_none());
        assert!(smart("Abc", "Abc123").is_some());
    }

    #[test]
    fn test_not_subsequence() {
        assert!(smart("ap", "banana").is_none());
        assert!(smart("ba", "ab").is_none());
        assert!(smart("abcd", "abc").is_none());
        assert!(smart("日本", "本日").is_none());
    }

    #[test]
    fn test_subsequence_spans_gaps() {
        let m = smart("ap", "grape").unwrap();
        assert_eq!(m.positions, vec![2, 3]);
        assert_eq!(m.score, 36);

        let m = smart("ap", "apple").unwrap();
        assert_eq!(m.positions, vec![0, 1]);
        assert_eq!(m.score, 62);
    }

    #[test]
    fn test_prefers_best_occurrence_over_first() {
        let m = smart("ab", "axb ab").unwrap();
        assert_eq!(m.positions, vec![4, 5]);
        assert_eq!(m.score, 62);
    }

    #[test]
    fn test_word_boundary_bonus() {
        let boundary = smart("fb", "foo_bar").unwrap();
        let inner = smart("fb", "foobar").unwrap();
        assert_eq!(boundary.positions, vec![0, 4]);
        assert!(boundary.score > inner.score);
    }

    #[test]
    fn test_camel_case_bonus() {
        let camel = smart("gu", "getUser").unwrap();
        let flat = smart("gu", "getuser").unwrap();
        assert_eq!(camel.positions, vec![0, 3]);
        assert!(camel.score > flat.score);
    }

    #[test]
    fn test_positions_are_char_indices() {
        let m = smart("ll", "Müller").unwrap();
        assert_eq!(m.positions, vec![2, 3]);

        let m = smart("ü", "MÜLLER").unwrap();
        assert_eq!(m.positions, vec![1]);
    }

    #[test]
    fn test_positions_spell_query() {
        let cases = [
            ("src", "crates/server/src/main.rs"),
            ("smr", "src/main.rs"),
            ("git co", "git checkout"),
            ("ffb", "fuzzy_file_browser"),
            ("xyz", "x_y_z"),
            ("a", "bbbbba"),
        ];
        for (query, candidate) in cases {
            let m = smart(query, candidate).unwrap();
            assert!(m.score > 0, "{query} in {candidate}");
            assert_eq!(spelled(candidate, &m.positions).to_lowercase(), query);
            assert!(m.positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_single_char_prefers_boundary() {
        let m = smart("b", "abc_b").unwrap();
        assert_eq!(m.positions, vec![4]);
    }

    #[test]
    fn test_long_gap_still_matches() {
        let candidate = format!("a{}b", "x".repeat(40));
        let m = smart("ab", &candidate).unwrap();
        assert_eq!(m.positions, vec![0, 41]);
        assert!(m.score > 0);
    }

    #[test]
    fn test_empty_query() {
        let m = smart("", "anything").unwrap();
        assert_eq!(m.score, 0);
        assert!(m.positions.is_empty());
    }

    #[test]
    fn test_explicit_insensitive_folds_query() {
        let m = fuzzy_match("ABC", "abc", CaseMatching::Insensitive).unwrap();
        assert_eq!(m.positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_ascii_prefilter() {
        assert!(is_ascii_subsequence(b"ace", b"abcde", true));
        assert!(!is_ascii_subsequence(b"aec", b"abcde", true));
        assert!(is_ascii_subsequence(b"ace", b"ABCDE", false));
        assert!(!is_ascii_subsequence(b"ace", b"ABCDE", true));
    }
}
