//! Gemini text generation client
//!
//! One `generateContent` call per attempt. The credential is supplied by the
//! dispatcher on every call and the model name is the endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::schemas::gemini::{GeminiError, GeminiRequest, GeminiResponse};
use crate::services::composer::RequestPayload;
use crate::services::credential_pool::Credential;
use crate::services::dispatcher::{RemoteService, ServiceError};
use crate::services::upstream::{classify_status, classify_transport};

// ============================================================================
// Constants
// ============================================================================

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-latest";

// ============================================================================
// Gemini Service
// ============================================================================

/// Configuration for the Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL (default: generativelanguage.googleapis.com)
    pub base_url: String,

    /// Model used when the caller supplies no model list
    pub default_model: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: GEMINI_API_BASE.to_string(),
            default_model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout_seconds: 120,
        }
    }
}

impl GeminiConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Stateless client for the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiService {
    client: Client,
    base_url: String,
    default_model: String,
}

impl GeminiService {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.default_model,
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl RemoteService for GeminiService {
    type Output = String;

    fn name(&self) -> &str {
        "gemini"
    }

    fn default_endpoint(&self) -> &str {
        &self.default_model
    }

    async fn call(
        &self,
        credential: &Credential,
        endpoint: &str,
        payload: &RequestPayload,
    ) -> Result<String, ServiceError> {
        let url = self.url(endpoint);
        let request = GeminiRequest::from_prompt(payload.prompt.as_str());

        tracing::debug!(
            model = %endpoint,
            credential = %credential,
            prompt_chars = payload.prompt.chars().count(),
            "Calling Gemini generateContent API"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<GeminiError>(&body)
                .map(|err| format!("{} ({})", err.error.message, err.error.status))
                .unwrap_or(body);
            return Err(classify_status(status, &headers, &detail));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Gemini response");
            ServiceError::Transient(format!("malformed response: {}", e))
        })?;

        parsed
            .text()
            .ok_or_else(|| ServiceError::Fatal("response contained no text".to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::credential_pool::SecretString;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> GeminiService {
        GeminiService::new(GeminiConfig::default().with_base_url(server.uri()).with_timeout(5))
            .unwrap()
    }

    fn credential(secret: &str) -> Credential {
        Credential::new(SecretString::new(secret), 0)
    }

    fn ok_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
    }

    #[test]
    fn test_gemini_config_defaults() {
        let config = GeminiConfig::default().with_base_url("https://custom.api.com");
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.default_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.timeout_seconds, 120);
    }

    #[tokio::test]
    async fn test_success_sends_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-flash-latest:generateContent"))
            .and(header("x-goog-api-key", "AIza-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("hello")))
            .expect(1)
            .mount(&server)
            .await;

        let text = service(&server)
            .call(
                &credential("AIza-test"),
                DEFAULT_GEMINI_MODEL,
                &RequestPayload::text("hi"),
            )
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let err = service(&server)
            .call(&credential("k"), "m", &RequestPayload::text("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = service(&server)
            .call(&credential("k"), "m", &RequestPayload::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transient(_)));
    }

    #[tokio::test]
    async fn test_invalid_key_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let err = service(&server)
            .call(&credential("k"), "m", &RequestPayload::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Fatal(msg) if msg.contains("API key not valid")));
    }

    #[tokio::test]
    async fn test_empty_answer_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"candidates": [{"finishReason": "SAFETY"}]})),
            )
            .mount(&server)
            .await;

        let err = service(&server)
            .call(&credential("k"), "m", &RequestPayload::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Fatal(_)));
    }
}
