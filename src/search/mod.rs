//! Candidate lists and the filter service
//!
//! The service owns two independently replaceable lists, the primary target
//! list and the command list. A filter request matches the query against both,
//! tags each hit with the list it came from, and merges the hits into one
//! score-ordered result set. Nothing is cached: every request rescans both
//! lists in full.

use crate::matcher::Matcher;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

/// Lists at least this long are matched in parallel
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000;

/// Which list a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The primary target list
    List,
    /// The command list
    Command,
}

impl Origin {
    pub fn label(self) -> &'static str {
        match self {
            Origin::List => "list",
            Origin::Command => "command",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of the score ordering in a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Lowest score first
    #[default]
    Ascending,
    /// Best match first
    Descending,
}

/// One matched candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub origin: Origin,
    pub text: String,
    pub score: i32,
    /// Matched character indices in `text`, ascending
    pub positions: Vec<usize>,
}

/// An ordered list of candidate strings tagged with its origin
#[derive(Debug, Clone)]
pub struct CandidateList {
    origin: Origin,
    items: Vec<String>,
}

impl CandidateList {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace every item at once
    pub fn replace(&mut self, items: Vec<String>) {
        self.items = items;
    }

    /// Match every item, in list order, keeping positive scores only
    pub fn filter(&self, matcher: &Matcher, parallel_threshold: usize) -> Vec<MatchResult> {
        if self.is_empty() {
            return Vec::new();
        }

        #[cfg(feature = "parallel")]
        {
            if parallel_threshold > 0 && self.items.len() >= parallel_threshold {
                use rayon::prelude::*;
                return self
                    .items
                    .par_iter()
                    .filter_map(|text| self.result_for(matcher, text))
                    .collect();
            }
        }
        #[cfg(not(feature = "parallel"))]
        let _ = parallel_threshold;

        self.items
            .iter()
            .filter_map(|text| self.result_for(matcher, text))
            .collect()
    }

    fn result_for(&self, matcher: &Matcher, text: &str) -> Option<MatchResult> {
        matcher.score(text).map(|m| MatchResult {
            origin: self.origin,
            text: text.to_string(),
            score: m.score,
            positions: m.positions,
        })
    }
}

/// Counters reported by the status call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    pub list_len: usize,
    pub command_len: usize,
    pub filters_served: u64,
    pub lists_replaced: u64,
    pub uptime_secs: u64,
}

/// Owner of both candidate lists
pub struct SearchService {
    list: RwLock<CandidateList>,
    commands: RwLock<CandidateList>,
    parallel_threshold: usize,
    start_time: Instant,
    filters_served: AtomicU64,
    lists_replaced: AtomicU64,
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLEL_THRESHOLD)
    }
}

impl SearchService {
    /// Create a service with both lists empty
    pub fn new(parallel_threshold: usize) -> Self {
        Self {
            list: RwLock::new(CandidateList::new(Origin::List)),
            commands: RwLock::new(CandidateList::new(Origin::Command)),
            parallel_threshold,
            start_time: Instant::now(),
            filters_served: AtomicU64::new(0),
            lists_replaced: AtomicU64::new(0),
        }
    }

    fn slot(&self, origin: Origin) -> &RwLock<CandidateList> {
        match origin {
            Origin::List => &self.list,
            Origin::Command => &self.commands,
        }
    }

    /// Replace the named list wholesale, returning how many items it now holds
    pub fn set_list(&self, origin: Origin, items: Vec<String>) -> usize {
        let count = items.len();
        self.slot(origin)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(items);
        self.lists_replaced.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Number of items currently in the named list
    pub fn len(&self, origin: Origin) -> usize {
        self.slot(origin)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Filter both lists, lowest score first
    pub fn filter(&self, query: &str) -> Vec<MatchResult> {
        self.filter_sorted(query, SortOrder::Ascending)
    }

    /// Filter both lists with an explicit score ordering.
    ///
    /// Hits from the target list precede hits from the command list before
    /// sorting, and the sort is stable, so equal scores keep that order.
    pub fn filter_sorted(&self, query: &str, order: SortOrder) -> Vec<MatchResult> {
        let matcher = Matcher::new(query);

        let mut results = self
            .list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .filter(&matcher, self.parallel_threshold);
        results.extend(
            self.commands
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .filter(&matcher, self.parallel_threshold),
        );

        match order {
            SortOrder::Ascending => results.sort_by_key(|r| r.score),
            SortOrder::Descending => results.sort_by_key(|r| std::cmp::Reverse(r.score)),
        }

        self.filters_served.fetch_add(1, Ordering::Relaxed);
        results
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            list_len: self.len(Origin::List),
            command_len: self.len(Origin::Command),
            filters_served: self.filters_served.load(Ordering::Relaxed),
            lists_replaced: self.lists_replaced.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
