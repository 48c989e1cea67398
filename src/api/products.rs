//! Product link analysis endpoint
//!
//! POST /v1/products/analyze

use axum::{extract::State, http::HeaderMap, response::Response, Json};

use crate::api::access::Access;
use crate::error::ApiError;
use crate::middleware::client::ClientId;
use crate::schemas::api::{validate_input, DispatchMeta, ProductRequest, ProductResponse};
use crate::server::state::AppState;
use crate::services::composer::compose;
use crate::services::presets::Tool;
use crate::services::product::{analysis_input, detect_platform, fetch_page_text, parse_analysis};
use crate::services::render::{RenderSink, ResponseSink};

pub async fn analyze_product(
    State(state): State<AppState>,
    client: ClientId,
    headers: HeaderMap,
    Json(body): Json<ProductRequest>,
) -> Result<Response, ApiError> {
    validate_input(&body, &[("url", body.url.as_str())])?;
    let url = body.url.trim();

    let platform = detect_platform(url).ok_or_else(|| {
        ApiError::invalid("Only TikTok, Shopee and Lazada product links are supported")
    })?;

    let access = Access::resolve(&state, client, &headers).await?;

    let page_text =
        fetch_page_text(&state.page_client, url, state.settings.page_text_max_chars).await;

    tracing::info!(
        client_id = %access.client,
        platform = %platform,
        page_text_chars = page_text.as_deref().map_or(0, |t| t.chars().count()),
        "Analyzing product"
    );

    let payload = compose(
        &analysis_input(platform, url, page_text.as_deref()),
        "",
        Tool::ProductAnalysis.instruction(),
    );
    let dispatched = state.generate_text(&access.text_pool, &payload).await?;

    let sink = ResponseSink::new();
    sink.render_text(&dispatched.value);
    let raw = sink.text();
    let analysis = parse_analysis(&raw);

    let mut response = ResponseSink::json(ProductResponse {
        platform,
        page_text_available: page_text.is_some(),
        share_text: analysis.share_text(),
        analysis,
        raw,
        meta: DispatchMeta::new(
            dispatched.credential_index,
            &dispatched.endpoint,
            &dispatched.report,
        ),
    });
    access.record_success(&mut response);

    Ok(response)
}
