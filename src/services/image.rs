//! Image generation clients
//!
//! Two backends share one [`RemoteService`] implementation:
//! - Hugging Face inference: `POST {base}/{model}` returning image bytes.
//! - Pollinations: a deterministic image URL, optionally fetched.
//!
//! Returned bytes are sniffed with `infer`; anything that is not an image is
//! never handed to the render sink.

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::services::composer::{ImageDimensions, RequestPayload};
use crate::services::credential_pool::Credential;
use crate::services::dispatcher::{RemoteService, ServiceError};
use crate::services::render::RenderedImage;
use crate::services::upstream::{classify_status, classify_transport};
use crate::utils::string::truncate_with_suffix;

pub const HUGGINGFACE_API_BASE: &str = "https://api-inference.huggingface.co/models";
pub const POLLINATIONS_API_BASE: &str = "https://image.pollinations.ai/prompt";
pub const DEFAULT_HUGGINGFACE_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";
pub const DEFAULT_POLLINATIONS_MODEL: &str = "flux";

/// Image generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackend {
    #[default]
    HuggingFace,
    Pollinations,
}

impl ImageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageBackend::HuggingFace => "huggingface",
            ImageBackend::Pollinations => "pollinations",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ImageBackend::HuggingFace => HUGGINGFACE_API_BASE,
            ImageBackend::Pollinations => POLLINATIONS_API_BASE,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ImageBackend::HuggingFace => DEFAULT_HUGGINGFACE_MODEL,
            ImageBackend::Pollinations => DEFAULT_POLLINATIONS_MODEL,
        }
    }

    /// Whether the backend can be used without an API key
    pub fn is_keyless(&self) -> bool {
        matches!(self, ImageBackend::Pollinations)
    }
}

impl fmt::Display for ImageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(ImageBackend::HuggingFace),
            "pollinations" => Ok(ImageBackend::Pollinations),
            other => Err(ConfigError::invalid(
                "IMAGE_PROVIDER",
                format!("unknown provider '{}', expected huggingface or pollinations", other),
            )),
        }
    }
}

/// Configuration for the image client
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub backend: ImageBackend,
    pub base_url: String,
    pub default_model: String,
    pub timeout_seconds: u64,
    /// Pollinations only: download the image instead of returning its URL
    pub fetch_bytes: bool,
}

impl ImageConfig {
    pub fn new(backend: ImageBackend) -> Self {
        Self {
            backend,
            base_url: backend.default_base_url().to_string(),
            default_model: backend.default_model().to_string(),
            timeout_seconds: 120,
            fetch_bytes: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_fetch_bytes(mut self, fetch: bool) -> Self {
        self.fetch_bytes = fetch;
        self
    }
}

/// Stateless client for the configured image backend
#[derive(Debug, Clone)]
pub struct ImageService {
    client: Client,
    config: ImageConfig,
}

impl ImageService {
    pub fn new(config: ImageConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn backend(&self) -> ImageBackend {
        self.config.backend
    }

    /// Deterministic Pollinations URL for a prompt
    pub fn reference_url(&self, endpoint: &str, payload: &RequestPayload) -> Result<Url, ServiceError> {
        let mut url = Url::parse(self.config.base_url.trim_end_matches('/'))
            .map_err(|e| ServiceError::Fatal(format!("invalid image base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Fatal("image base URL cannot take a path".to_string()))?
            .push(&payload.prompt);

        let dimensions = payload.dimensions.unwrap_or_default();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("width", &dimensions.width.to_string())
                .append_pair("height", &dimensions.height.to_string());
            if let Some(seed) = payload.seed {
                query.append_pair("seed", &seed.to_string());
            }
            query.append_pair("nologo", "true").append_pair("model", endpoint);
        }
        Ok(url)
    }

    async fn call_huggingface(
        &self,
        credential: &Credential,
        endpoint: &str,
        payload: &RequestPayload,
    ) -> Result<RenderedImage, ServiceError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let ImageDimensions { width, height } = payload.dimensions.unwrap_or_default();

        let mut parameters = json!({ "width": width, "height": height });
        if let Some(seed) = payload.seed {
            parameters["seed"] = json!(seed);
        }
        let body = json!({ "inputs": payload.prompt, "parameters": parameters });

        let mut request = self.client.post(&url).json(&body);
        if !credential.is_anonymous() {
            request = request.bearer_auth(credential.secret());
        }

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        read_image(response).await
    }

    async fn call_pollinations(
        &self,
        credential: &Credential,
        endpoint: &str,
        payload: &RequestPayload,
    ) -> Result<RenderedImage, ServiceError> {
        let url = self.reference_url(endpoint, payload)?;

        if !self.config.fetch_bytes {
            return Ok(RenderedImage::Reference { url: url.into() });
        }

        let mut request = self.client.get(url);
        if !credential.is_anonymous() {
            request = request.bearer_auth(credential.secret());
        }

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        read_image(response).await
    }
}

#[async_trait]
impl RemoteService for ImageService {
    type Output = RenderedImage;

    fn name(&self) -> &str {
        self.config.backend.as_str()
    }

    fn default_endpoint(&self) -> &str {
        &self.config.default_model
    }

    async fn call(
        &self,
        credential: &Credential,
        endpoint: &str,
        payload: &RequestPayload,
    ) -> Result<RenderedImage, ServiceError> {
        tracing::debug!(
            backend = %self.config.backend,
            model = %endpoint,
            credential = %credential,
            seed = ?payload.seed,
            "Calling image backend"
        );

        match self.config.backend {
            ImageBackend::HuggingFace => self.call_huggingface(credential, endpoint, payload).await,
            ImageBackend::Pollinations => self.call_pollinations(credential, endpoint, payload).await,
        }
    }
}

/// Turn an upstream response into image bytes, or classify why not
async fn read_image(response: reqwest::Response) -> Result<RenderedImage, ServiceError> {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;

    if !status.is_success() {
        return Err(classify_status(
            status,
            &headers,
            &String::from_utf8_lossy(&bytes),
        ));
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("application/json"));

    sniff_image(bytes.to_vec(), is_json)
}

fn sniff_image(data: Vec<u8>, is_json: bool) -> Result<RenderedImage, ServiceError> {
    match infer::get(&data) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            Ok(RenderedImage::Bytes {
                mime_type: kind.mime_type().to_string(),
                data,
            })
        }
        // Model still loading, or a queued job.
        _ if is_json => Err(ServiceError::Transient(format!(
            "backend returned JSON instead of an image: {}",
            truncate_with_suffix(&String::from_utf8_lossy(&data), 200, "...")
        ))),
        _ => Err(ServiceError::Fatal(
            "backend response is not an image".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::credential_pool::{CredentialPool, SecretString};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn payload(seed: Option<u64>) -> RequestPayload {
        RequestPayload::text("a red cat")
            .with_dimensions(ImageDimensions::new(540, 960))
            .with_seed(seed)
    }

    fn hf(server: &MockServer) -> ImageService {
        ImageService::new(
            ImageConfig::new(ImageBackend::HuggingFace)
                .with_base_url(server.uri())
                .with_timeout(5),
        )
        .unwrap()
    }

    fn key(secret: &str) -> Credential {
        Credential::new(SecretString::new(secret), 0)
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Pollinations".parse::<ImageBackend>().unwrap(), ImageBackend::Pollinations);
        assert_eq!("hf".parse::<ImageBackend>().unwrap(), ImageBackend::HuggingFace);
        assert!("dalle".parse::<ImageBackend>().is_err());
    }

    #[test]
    fn test_reference_url_is_deterministic() {
        let service = ImageService::new(ImageConfig::new(ImageBackend::Pollinations)).unwrap();
        let first = service.reference_url("flux", &payload(Some(42))).unwrap();
        let second = service.reference_url("flux", &payload(Some(42))).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.as_str(),
            "https://image.pollinations.ai/prompt/a%20red%20cat?width=540&height=960&seed=42&nologo=true&model=flux"
        );

        let unseeded = service.reference_url("flux", &payload(None)).unwrap();
        assert!(!unseeded.as_str().contains("seed="));
    }

    #[tokio::test]
    async fn test_huggingface_returns_sniffed_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stabilityai/stable-diffusion-xl-base-1.0"))
            .and(header("authorization", "Bearer hf_test"))
            .and(body_partial_json(json!({
                "inputs": "a red cat",
                "parameters": {"width": 540, "height": 960, "seed": 7}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PNG.to_vec(), "image/png"))
            .expect(1)
            .mount(&server)
            .await;

        let image = hf(&server)
            .call(&key("hf_test"), DEFAULT_HUGGINGFACE_MODEL, &payload(Some(7)))
            .await
            .unwrap();
        assert_eq!(
            image,
            RenderedImage::Bytes {
                data: PNG.to_vec(),
                mime_type: "image/png".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_huggingface_loading_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "Model is currently loading", "estimated_time": 20.0
            })))
            .mount(&server)
            .await;

        let err = hf(&server)
            .call(&key("hf_test"), "m", &payload(None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transient(msg) if msg.contains("loading")));
    }

    #[tokio::test]
    async fn test_huggingface_status_classes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let service = hf(&server);
        let limited = service.call(&key("k"), "limited", &payload(None)).await.unwrap_err();
        assert!(matches!(limited, ServiceError::RateLimited { .. }));
        let forbidden = service.call(&key("k"), "forbidden", &payload(None)).await.unwrap_err();
        assert!(matches!(forbidden, ServiceError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_non_image_bytes_are_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"<html>".to_vec(), "text/html"))
            .mount(&server)
            .await;

        let err = hf(&server).call(&key("k"), "m", &payload(None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_seeded_fetch_is_repeatable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prompt/a%20red%20cat"))
            .and(query_param("seed", "42"))
            .and(query_param("width", "540"))
            .and(query_param("height", "960"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PNG.to_vec(), "image/png"))
            .expect(2)
            .mount(&server)
            .await;

        let service = ImageService::new(
            ImageConfig::new(ImageBackend::Pollinations)
                .with_base_url(format!("{}/prompt", server.uri()))
                .with_fetch_bytes(true),
        )
        .unwrap();
        let pool = CredentialPool::anonymous("pollinations");
        let anonymous = pool.last();

        let first = service.call(anonymous, "flux", &payload(Some(42))).await.unwrap();
        let second = service.call(anonymous, "flux", &payload(Some(42))).await.unwrap();
        assert_eq!(first, second);
    }
}
