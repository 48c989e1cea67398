//! Error types shared across the crate

mod types;

pub use types::{ApiError, ConfigError, ErrorDetail, ErrorResponse};
