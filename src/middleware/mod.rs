//! Middleware module
//!
//! Contains HTTP middleware for caller identity, rate limiting and logging.

pub mod client;
pub mod logging;
pub mod rate_limit;

// Re-export commonly used items
pub use client::{ClientId, CLIENT_ID_HEADER, GEMINI_KEY_HEADER, LICENSE_KEY_HEADER};
pub use logging::{log_request, TraceId, REQUEST_ID_HEADER, TRACE_ID_HEADER};
pub use rate_limit::{rate_limit, RateLimitState};
