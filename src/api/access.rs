//! Per-request access resolution
//!
//! Decides which Gemini pool a request uses and whether it is metered
//! against the free daily quota:
//! - `x-gemini-api-key` present: a request-scoped pool with that key.
//! - otherwise: the server pool.
//! - valid `x-license-key`: Pro plan, not metered. Without one, a free slot
//!   is reserved before any remote call, whichever pool is used.

use axum::{
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::client::{header_value, ClientId, GEMINI_KEY_HEADER, LICENSE_KEY_HEADER};
use crate::server::state::AppState;
use crate::services::credential_pool::CredentialPool;
use crate::services::quota::{Plan, QuotaReservation};

/// Prefix every Gemini API key starts with
pub const GEMINI_KEY_PREFIX: &str = "AIza";

pub const QUOTA_REMAINING_HEADER: &str = "x-quota-remaining";

/// Resolved access for one request
///
/// Dropping it before [`Access::record_success`] gives the reserved free slot
/// back.
#[derive(Debug)]
pub struct Access {
    pub client: ClientId,
    pub plan: Plan,
    pub text_pool: Arc<CredentialPool>,
    reservation: Option<QuotaReservation>,
}

impl Access {
    /// Resolve the pool and plan, failing early when the free quota is used up
    pub async fn resolve(
        state: &AppState,
        client: ClientId,
        headers: &HeaderMap,
    ) -> Result<Self, ApiError> {
        let plan = state.quota.plan_for(header_value(headers, LICENSE_KEY_HEADER));

        let text_pool = match header_value(headers, GEMINI_KEY_HEADER) {
            Some(key) => {
                if !key.starts_with(GEMINI_KEY_PREFIX) {
                    return Err(ApiError::invalid(format!(
                        "{} must be a Gemini API key starting with '{}'",
                        GEMINI_KEY_HEADER, GEMINI_KEY_PREFIX
                    )));
                }
                let pool = CredentialPool::load("gemini", [key])
                    .map_err(|e| ApiError::invalid(e.to_string()))?;
                tracing::debug!(client_id = %client, "Using caller-supplied Gemini key");
                Arc::new(pool)
            }
            None => Arc::clone(&state.text_pool),
        };

        let reservation = state.quota.reserve(client.as_str(), plan).await?;

        Ok(Self {
            client,
            plan,
            text_pool,
            reservation,
        })
    }

    /// Keep the reserved slot and report the remaining allowance
    pub fn record_success(self, response: &mut Response) {
        let Some(reservation) = self.reservation else {
            return;
        };
        let remaining = reservation.commit();
        if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
            response.headers_mut().insert(QUOTA_REMAINING_HEADER, value);
        }
    }
}
