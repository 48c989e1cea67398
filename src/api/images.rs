//! Image generation endpoint
//!
//! POST /v1/images
//!
//! The description is first translated into an English image prompt with
//! Gemini, then the style suffix is appended and the prompt is sent to the
//! image backend.

use axum::{extract::State, http::HeaderMap, response::Response, Json};

use crate::api::access::Access;
use crate::error::ApiError;
use crate::middleware::client::ClientId;
use crate::schemas::api::{validate_input, DispatchMeta, ImageRequest, ImageResponse};
use crate::server::state::AppState;
use crate::services::composer::{compose, ImageDimensions};
use crate::services::presets::{image_style, Tool};
use crate::services::render::{RenderSink, RenderedImage, ResponseSink};

pub async fn generate_image(
    State(state): State<AppState>,
    client: ClientId,
    headers: HeaderMap,
    Json(body): Json<ImageRequest>,
) -> Result<Response, ApiError> {
    validate_input(&body, &[("description", body.description.as_str())])?;
    let style = image_style(body.style.as_deref())?;

    let image_pool = state.image_pool.clone().ok_or_else(|| {
        ApiError::NotConfigured(format!(
            "Image generation with {} has no API key configured.",
            state.settings.image.provider
        ))
    })?;

    let access = Access::resolve(&state, client, &headers).await?;

    let translation = compose(&body.description, "", Tool::ImagePrompt.instruction());
    let translated = state.generate_text(&access.text_pool, &translation).await?;
    let english = translated.value.trim();

    let defaults = ImageDimensions::default();
    let dimensions = ImageDimensions::new(
        body.width.unwrap_or(defaults.width),
        body.height.unwrap_or(defaults.height),
    );
    let payload = compose(english, style, "")
        .with_dimensions(dimensions)
        .with_seed(body.seed);

    tracing::info!(
        client_id = %access.client,
        provider = %state.image.backend(),
        width = dimensions.width,
        height = dimensions.height,
        seed = ?body.seed,
        "Generating image"
    );

    let dispatched = state.generate_image(&image_pool, &payload).await?;

    let sink = ResponseSink::new();
    sink.render_image(&dispatched.value);

    let mut response = if body.download {
        sink.download()
    } else {
        let (url, mime_type) = match &dispatched.value {
            RenderedImage::Reference { url } => (Some(url.clone()), None),
            RenderedImage::Bytes { mime_type, .. } => (None, Some(mime_type.clone())),
        };
        ResponseSink::json(ImageResponse {
            prompt: payload.prompt.clone(),
            url,
            mime_type,
            data: dispatched.value.base64(),
            meta: DispatchMeta::new(
                dispatched.credential_index,
                &dispatched.endpoint,
                &dispatched.report,
            ),
        })
    };
    access.record_success(&mut response);

    Ok(response)
}
