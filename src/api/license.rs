//! License key verification
//!
//! POST /v1/license/verify

use axum::{extract::State, Json};

use crate::schemas::api::{LicenseRequest, LicenseResponse};
use crate::server::state::AppState;
use crate::services::quota::Plan;

pub async fn verify_license(
    State(state): State<AppState>,
    Json(body): Json<LicenseRequest>,
) -> Json<LicenseResponse> {
    let plan = state.quota.plan_for(Some(&body.key));
    Json(LicenseResponse {
        valid: plan == Plan::Pro,
        plan: plan.as_str(),
    })
}
