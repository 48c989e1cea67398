//! Text tool endpoint
//!
//! POST /v1/tools/:tool

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    Json,
};

use crate::api::access::Access;
use crate::error::ApiError;
use crate::middleware::client::ClientId;
use crate::schemas::api::{validate_input, DispatchMeta, ToolRequest, ToolResponse};
use crate::server::state::AppState;
use crate::services::composer::compose;
use crate::services::presets::Tool;
use crate::services::render::{RenderSink, ResponseSink};

/// Run one of the text tools
///
/// Blank input is rejected before any upstream call. The option label picks
/// the platform (content plans) or tone (comment replies).
pub async fn run_tool(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    client: ClientId,
    headers: HeaderMap,
    Json(body): Json<ToolRequest>,
) -> Result<Response, ApiError> {
    let tool: Tool = tool.parse()?;
    validate_input(&body, &[("text", body.text.as_str())])?;
    let fragment = tool.option_fragment(body.option.as_deref())?;

    let access = Access::resolve(&state, client, &headers).await?;

    let payload = compose(&body.text, fragment, tool.instruction());

    tracing::info!(
        tool = %tool,
        client_id = %access.client,
        plan = access.plan.as_str(),
        "Running text tool"
    );

    let dispatched = state.generate_text(&access.text_pool, &payload).await?;

    let sink = ResponseSink::new();
    sink.render_text(&dispatched.value);

    let mut response = ResponseSink::json(ToolResponse {
        tool: tool.to_string(),
        text: sink.text(),
        meta: DispatchMeta::new(
            dispatched.credential_index,
            &dispatched.endpoint,
            &dispatched.report,
        ),
    });
    access.record_success(&mut response);

    Ok(response)
}
