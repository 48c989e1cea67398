//! Shared classification of upstream HTTP failures

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;

use crate::services::dispatcher::ServiceError;
use crate::utils::string::truncate_with_suffix;

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Retry-After header in delta-seconds form
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Classify a non-success status code
///
/// 429 is a rate limit, 408 and 5xx are transient, every other status
/// means the request itself or the credential is wrong.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ServiceError {
    let message = format!(
        "HTTP {}: {}",
        status.as_u16(),
        truncate_with_suffix(body.trim(), MAX_ERROR_BODY_CHARS, "...")
    );

    if status == StatusCode::TOO_MANY_REQUESTS {
        ServiceError::RateLimited {
            message,
            retry_after: retry_after(headers),
        }
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        ServiceError::Transient(message)
    } else {
        ServiceError::Fatal(message)
    }
}

/// Classify a transport-level failure
pub fn classify_transport(err: &reqwest::Error) -> ServiceError {
    if err.is_builder() {
        ServiceError::Fatal(format!("invalid request: {}", err))
    } else {
        ServiceError::Transient(format!("request failed: {}", err))
    }
}
