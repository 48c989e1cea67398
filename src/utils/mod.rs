//! Utility modules
//!
//! Backoff timing and string helpers.

pub mod backoff;
pub mod string;

pub use backoff::BackoffPolicy;
pub use string::{collapse_whitespace, truncate_str, truncate_with_suffix};
