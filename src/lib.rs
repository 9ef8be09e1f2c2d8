//! # fzd - fuzzy-filter daemon
//!
//! A long-running local service that holds two candidate lists in memory (a
//! target list and a command list) and answers fuzzy-filter requests against
//! them over a Unix socket or loopback TCP.
//!
//! ## Architecture
//!
//! - [`matcher`] - fzf-style fuzzy scoring with match positions
//! - [`search`] - the two candidate lists and the merged, sorted filter
//! - [`server`] - framing, JSON-RPC protocol, daemon loop and client
//! - [`output`] - terminal rendering of results
//! - [`utils`] - configuration and app data directory
//!
//! ## Quick Start
//!
//! ```
//! use fzd::search::{Origin, SearchService};
//!
//! let service = SearchService::default();
//! service.set_list(Origin::List, vec!["apple".into(), "banana".into()]);
//! service.set_list(Origin::Command, vec!["grape".into()]);
//!
//! let texts: Vec<String> = service.filter("ap").into_iter().map(|r| r.text).collect();
//! assert_eq!(texts, ["grape", "apple"]);
//! ```

pub mod matcher;
pub mod output;
pub mod search;
pub mod server;
pub mod utils;
