//! Creator Hub library
//!
//! Prompt presets for content creators, dispatched to Gemini and to an image
//! backend through a multi-key fallback chain.

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod schemas;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::ApiError;
pub use server::App;
