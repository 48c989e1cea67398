//! Caller identity
//!
//! Clients identify themselves with `x-client-id`; otherwise the remote
//! address is used. The id keys both the rate limiter and the daily quota.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap},
};
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;

use crate::utils::string::truncate_str;

/// Header carrying a stable client id
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Header carrying a Pro license key
pub const LICENSE_KEY_HEADER: &str = "x-license-key";

/// Header carrying a caller-supplied Gemini key
pub const GEMINI_KEY_HEADER: &str = "x-gemini-api-key";

const MAX_CLIENT_ID_CHARS: usize = 128;

/// Identity used for rate limiting and quota accounting
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn from_parts(headers: &HeaderMap, extensions: &Extensions) -> Self {
        if let Some(id) = headers
            .get(CLIENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return Self(truncate_str(id, MAX_CLIENT_ID_CHARS).to_string());
        }

        match extensions.get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(addr)) => Self(addr.ip().to_string()),
            None => Self("unknown".to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(&parts.headers, &parts.extensions))
    }
}

/// Non-empty header value as a string slice
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
