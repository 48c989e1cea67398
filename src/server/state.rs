//! Application state container
//!
//! This module defines the shared application state that is passed
//! to all request handlers via Axum's state extraction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::services::composer::RequestPayload;
use crate::services::credential_pool::CredentialPool;
use crate::services::dispatcher::{DispatchError, Dispatched, FallbackDispatcher};
use crate::services::gemini::{GeminiConfig, GeminiService};
use crate::services::image::{ImageConfig, ImageService};
use crate::services::quota::QuotaTracker;
use crate::services::render::RenderedImage;

/// Shared application state
///
/// Everything here is immutable after startup and cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Server-side Gemini keys
    pub text_pool: Arc<CredentialPool>,

    /// Image keys; `None` when the image backend is not configured
    pub image_pool: Option<Arc<CredentialPool>>,

    pub gemini: Arc<GeminiService>,
    pub image: Arc<ImageService>,
    pub dispatcher: Arc<FallbackDispatcher>,
    pub quota: QuotaTracker,

    /// Client for fetching product pages
    pub page_client: Client,

    /// Cancelled on shutdown; every dispatch runs on a child token
    pub shutdown: CancellationToken,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    /// Create a new application state
    ///
    /// Fails when no Gemini key is configured.
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let text_pool = settings.text_pool()?;
        let image_pool = settings.image_pool();

        tracing::info!(
            key_count = text_pool.len(),
            models = ?settings.gemini.models,
            "Gemini credential pool ready"
        );

        match &image_pool {
            Some(pool) => tracing::info!(
                provider = %settings.image.provider,
                key_count = pool.len(),
                anonymous = pool.last().is_anonymous(),
                "Image credential pool ready"
            ),
            None => tracing::warn!(
                provider = %settings.image.provider,
                "No image API keys configured, image generation is disabled"
            ),
        }

        let gemini = GeminiService::new(
            GeminiConfig::default()
                .with_base_url(settings.gemini.base_url.clone())
                .with_timeout(settings.request_timeout_seconds),
        )?;

        let image = ImageService::new(
            ImageConfig::new(settings.image.provider)
                .with_base_url(settings.image.base_url.clone())
                .with_timeout(settings.request_timeout_seconds)
                .with_fetch_bytes(settings.image.fetch_bytes),
        )?;

        let page_client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()?;

        let dispatcher = FallbackDispatcher::new(settings.dispatch.policy());
        let quota = QuotaTracker::new(settings.quota.free_daily_limit, &settings.quota.license_keys);

        Ok(Self {
            text_pool: Arc::new(text_pool),
            image_pool: image_pool.map(Arc::new),
            gemini: Arc::new(gemini),
            image: Arc::new(image),
            dispatcher: Arc::new(dispatcher),
            quota,
            page_client,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
            settings: Arc::new(settings),
        })
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Send a text prompt through the fallback chain
    pub async fn generate_text(
        &self,
        pool: &CredentialPool,
        payload: &RequestPayload,
    ) -> Result<Dispatched<String>, DispatchError> {
        let cancel = self.shutdown.child_token();
        self.dispatcher
            .dispatch(
                self.gemini.as_ref(),
                payload,
                pool,
                &self.settings.gemini.models,
                &cancel,
            )
            .await
    }

    /// Send an image prompt through the fallback chain
    pub async fn generate_image(
        &self,
        pool: &CredentialPool,
        payload: &RequestPayload,
    ) -> Result<Dispatched<RenderedImage>, DispatchError> {
        let cancel = self.shutdown.child_token();
        self.dispatcher
            .dispatch(
                self.image.as_ref(),
                payload,
                pool,
                &self.settings.image.models,
                &cancel,
            )
            .await
    }
}
