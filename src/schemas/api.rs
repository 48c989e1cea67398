//! Request and response bodies of the public HTTP API

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;
use crate::services::dispatcher::DispatchReport;
use crate::services::product::{Platform, ProductAnalysis};

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /v1/tools/:tool`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ToolRequest {
    #[validate(length(max = 8000))]
    pub text: String,

    /// Platform or tone label, depending on the tool
    #[serde(default)]
    pub option: Option<String>,
}

/// Body of `POST /v1/images`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ImageRequest {
    #[validate(length(max = 8000))]
    pub description: String,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    #[validate(range(min = 64, max = 2048))]
    pub width: Option<u32>,

    #[serde(default)]
    #[validate(range(min = 64, max = 2048))]
    pub height: Option<u32>,

    #[serde(default)]
    pub seed: Option<u64>,

    /// Return raw bytes as an attachment instead of JSON
    #[serde(default)]
    pub download: bool,
}

/// Body of `POST /v1/products/analyze`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(url)]
    pub url: String,
}

/// Body of `POST /v1/license/verify`
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseRequest {
    pub key: String,
}

/// Run derive validation, then reject blank required text
///
/// Blank input never reaches a remote service.
pub fn validate_input<T: Validate>(body: &T, required: &[(&str, &str)]) -> Result<(), ApiError> {
    body.validate().map_err(validation_message)?;
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ApiError::invalid(format!("{} must not be empty", field)));
        }
    }
    Ok(())
}

fn validation_message(errors: ValidationErrors) -> ApiError {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let codes: Vec<&str> = errs.iter().map(|e| e.code.as_ref()).collect();
            format!("{} ({})", field, codes.join(", "))
        })
        .collect();
    fields.sort();
    ApiError::invalid(format!("invalid fields: {}", fields.join("; ")))
}

// ============================================================================
// Responses
// ============================================================================

/// Where a result came from, without exposing any secret
#[derive(Debug, Clone, Serialize)]
pub struct DispatchMeta {
    /// Zero-based position of the credential that succeeded
    pub credential_index: usize,
    pub endpoint: String,
    pub attempts: usize,
    pub backoff_rounds: u32,
}

impl DispatchMeta {
    pub fn new(credential_index: usize, endpoint: &str, report: &DispatchReport) -> Self {
        Self {
            credential_index,
            endpoint: endpoint.to_string(),
            attempts: report.attempt_count(),
            backoff_rounds: report.backoff_rounds,
        }
    }
}

/// Response of `POST /v1/tools/:tool`
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub tool: String,
    pub text: String,
    pub meta: DispatchMeta,
}

/// JSON response of `POST /v1/images`
#[derive(Debug, Clone, Serialize)]
pub struct ImageResponse {
    /// English prompt actually sent to the image backend
    pub prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Base64 image bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    pub meta: DispatchMeta,
}

/// Response of `POST /v1/products/analyze`
#[derive(Debug, Clone, Serialize)]
pub struct ProductResponse {
    pub platform: Platform,
    pub page_text_available: bool,
    #[serde(flatten)]
    pub analysis: ProductAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_text: Option<String>,
    /// Raw model answer, for clients that render it themselves
    pub raw: String,
    pub meta: DispatchMeta,
}

/// Response of `POST /v1/license/verify`
#[derive(Debug, Clone, Serialize)]
pub struct LicenseResponse {
    pub valid: bool,
    pub plan: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_rejected() {
        let body = ToolRequest {
            text: "   \n".to_string(),
            option: None,
        };
        let err = validate_input(&body, &[("text", body.text.as_str())]).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(msg) if msg.contains("text")));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let body = ImageRequest {
            description: "a cat".to_string(),
            style: None,
            width: Some(4096),
            height: None,
            seed: None,
            download: false,
        };
        let err = validate_input(&body, &[]).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(msg) if msg.contains("width")));
    }

    #[test]
    fn test_product_url_must_be_url() {
        let bad = ProductRequest {
            url: "shopee".to_string(),
        };
        assert!(validate_input(&bad, &[]).is_err());

        let good = ProductRequest {
            url: "https://shopee.co.th/item".to_string(),
        };
        assert!(validate_input(&good, &[]).is_ok());
    }
}
