//! Fuzzy matching engine
//!
//! - [`charclass`] - character classes and the bonus table
//! - [`fuzzy`] - optimal subsequence alignment with scoring and positions
//!
//! ```
//! use fzd::matcher::Matcher;
//!
//! let matcher = Matcher::new("fb");
//! let m = matcher.score("foo_bar").unwrap();
//! assert_eq!(m.positions, vec![0, 4]);
//! ```

pub mod charclass;
pub mod fuzzy;

pub use fuzzy::{fuzzy_match, CaseMatching, MatchScore};

/// A query prepared once and applied to many candidates.
///
/// The case policy is fixed at construction so every candidate of one filter
/// request is judged the same way.
#[derive(Debug, Clone)]
pub struct Matcher {
    query: String,
    case: CaseMatching,
}

impl Matcher {
    /// Prepare `query` with smart case
    pub fn new(query: &str) -> Self {
        Self::with_case(query, CaseMatching::smart(query))
    }

    pub fn with_case(query: &str, case: CaseMatching) -> Self {
        Self {
            query: query.to_string(),
            case,
        }
    }

    pub fn case(&self) -> CaseMatching {
        self.case
    }

    /// Match a candidate, keeping only strictly positive scores
    pub fn score(&self, candidate: &str) -> Option<MatchScore> {
        fuzzy_match(&self.query, candidate, self.case).filter(|m| m.score > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_fixes_case_once() {
        let m = Matcher::new("Abc");
        assert_eq!(m.case(), CaseMatching::Sensitive);
        assert!(m.score("abc123").is_none());
        assert!(m.score("Abc123").is_some());
    }

    #[test]
    fn test_matcher_drops_zero_scores() {
        let m = Matcher::new("");
        assert!(m.score("anything").is_none());
        assert!(fuzzy_match("", "anything", m.case()).is_some());
    }
}
