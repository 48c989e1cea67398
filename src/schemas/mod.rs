//! Schema module
//!
//! Wire formats of the upstream APIs and of this service's own endpoints.

pub mod api;
pub mod gemini;
