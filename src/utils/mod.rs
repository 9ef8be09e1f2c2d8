//! Shared utilities
//!
//! - [`app_data`] - Configuration file and app data directory (XDG-compliant)

pub mod app_data;

pub use app_data::*;
