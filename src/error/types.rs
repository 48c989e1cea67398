//! API and configuration error types

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::dispatcher::DispatchError;
use crate::services::presets::UnknownPreset;

/// Retry hint when an exhausted dispatch carried none from upstream
const DEFAULT_RETRY_AFTER_SECONDS: u64 = 30;

/// Startup configuration errors; the process must not accept requests
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No credentials configured for {service}")]
    EmptyPool { service: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced to HTTP clients
///
/// Every variant carries a next action so the user is never left with a
/// bare failure message.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Free quota of {limit} requests per day used up")]
    QuotaExceeded { limit: u32, retry_after_seconds: u64 },

    #[error("Too many requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Service unavailable: {message}")]
    Unavailable {
        message: String,
        next_action: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    fn parts(&self) -> (StatusCode, &'static str, String, String, Option<u64>) {
        match self {
            ApiError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                msg.clone(),
                "Fix the highlighted input and submit again.".to_string(),
                None,
            ),
            ApiError::QuotaExceeded {
                limit,
                retry_after_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded_error",
                format!("The free plan allows {} requests per day.", limit),
                "Send a Pro license key in the x-license-key header, or try again tomorrow."
                    .to_string(),
                Some(*retry_after_seconds),
            ),
            ApiError::RateLimited {
                retry_after_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "Too many requests from this client.".to_string(),
                format!("Wait {} seconds and retry.", retry_after_seconds),
                Some(*retry_after_seconds),
            ),
            ApiError::Unavailable {
                message,
                next_action,
                retry_after_seconds,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable_error",
                message.clone(),
                next_action.clone(),
                *retry_after_seconds,
            ),
            ApiError::NotConfigured(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "not_configured_error",
                msg.clone(),
                "Ask the operator to configure the missing credentials, or switch provider."
                    .to_string(),
                None,
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "api_error",
                    "An internal error occurred.".to_string(),
                    "Retry in a few seconds.".to_string(),
                    None,
                )
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Exhausted {
                service,
                last_error,
                report,
            } => {
                tracing::warn!(
                    service = %service,
                    attempts = report.attempt_count(),
                    backoff_rounds = report.backoff_rounds,
                    "Returning dispatch failure to client"
                );
                // Busy keys earlier in the pool keep the failure retryable.
                if last_error.is_retryable() || report.had_retryable_failure() {
                    let secs = last_error
                        .retry_after()
                        .map(|d| d.as_secs().max(1))
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECONDS);
                    ApiError::Unavailable {
                        message: format!("Every {} key is busy or rate limited.", service),
                        next_action: format!("Wait {} seconds and retry.", secs),
                        retry_after_seconds: Some(secs),
                    }
                } else {
                    ApiError::Unavailable {
                        message: format!("{} rejected the request.", service),
                        next_action: "Check the input and the API key, or switch provider."
                            .to_string(),
                        retry_after_seconds: None,
                    }
                }
            }
            DispatchError::Cancelled { .. } => ApiError::Unavailable {
                message: "The request was cancelled because the server is shutting down."
                    .to_string(),
                next_action: "Retry in a few seconds.".to_string(),
                retry_after_seconds: Some(5),
            },
        }
    }
}

impl From<UnknownPreset> for ApiError {
    fn from(err: UnknownPreset) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, next_action, retry_after) = self.parts();

        let body = Json(ErrorResponse::new(error_type, message, next_action));
        let mut response = (status, body).into_response();

        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
        }

        response
    }
}

/// JSON error envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub type_: String,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
    pub next_action: String,
}

impl ErrorResponse {
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        next_action: impl Into<String>,
    ) -> Self {
        Self {
            type_: "error".to_string(),
            error: ErrorDetail {
                type_: error_type.into(),
                message: message.into(),
                next_action: next_action.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_status() {
        let response = ApiError::invalid("text must not be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.headers().contains_key("retry-after"));
    }

    #[test]
    fn test_unavailable_sets_retry_after() {
        let response = ApiError::Unavailable {
            message: "All keys are rate limited".to_string(),
            next_action: "Wait 20 seconds and retry.".to_string(),
            retry_after_seconds: Some(20),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["retry-after"], "20");
    }

    #[test]
    fn test_quota_exceeded_status() {
        let response = ApiError::QuotaExceeded {
            limit: 5,
            retry_after_seconds: 3600,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "3600");
    }

    #[test]
    fn test_exhausted_rate_limit_maps_to_retry_hint() {
        use crate::services::dispatcher::{DispatchReport, ServiceError};
        use std::time::Duration;

        let err = DispatchError::Exhausted {
            service: "gemini".to_string(),
            last_error: ServiceError::RateLimited {
                message: "HTTP 429".to_string(),
                retry_after: Some(Duration::from_secs(12)),
            },
            report: DispatchReport::default(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["retry-after"], "12");
    }

    #[test]
    fn test_exhausted_fatal_has_no_retry_hint() {
        use crate::services::dispatcher::{DispatchReport, ServiceError};

        let err = DispatchError::Exhausted {
            service: "gemini".to_string(),
            last_error: ServiceError::Fatal("HTTP 400: API key not valid".to_string()),
            report: DispatchReport::default(),
        };
        match ApiError::from(err) {
            ApiError::Unavailable {
                message,
                next_action,
                retry_after_seconds,
            } => {
                assert!(!message.contains("API key not valid"));
                assert!(next_action.contains("API key"));
                assert_eq!(retry_after_seconds, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_busy_keys_before_fatal_last_key_keep_retry_hint() {
        use crate::services::dispatcher::{
            AttemptOutcome, DispatchAttempt, DispatchReport, ServiceError,
        };

        let attempt = |credential_index, outcome| DispatchAttempt {
            credential_index,
            endpoint: "gemini-flash-latest".to_string(),
            outcome,
            backoff_round: None,
        };
        let err = DispatchError::Exhausted {
            service: "gemini".to_string(),
            last_error: ServiceError::Fatal("HTTP 403".to_string()),
            report: DispatchReport {
                attempts: vec![
                    attempt(0, AttemptOutcome::RateLimited),
                    attempt(1, AttemptOutcome::FatalError),
                ],
                ..Default::default()
            },
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers()["retry-after"],
            DEFAULT_RETRY_AFTER_SECONDS.to_string()
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let body = ErrorResponse::new("invalid_request_error", "bad", "fix it");
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"next_action\":\"fix it\""));
    }
}
