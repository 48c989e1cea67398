//! Services module
//!
//! Contains business logic and external service integrations.

pub mod composer;
pub mod credential_pool;
pub mod dispatcher;
pub mod gemini;
pub mod image;
pub mod presets;
pub mod product;
pub mod quota;
pub mod render;
pub mod upstream;

pub use composer::{compose, ImageDimensions, RequestPayload};
pub use credential_pool::{Credential, CredentialPool, SecretString};
pub use dispatcher::{
    AttemptOutcome, DispatchAttempt, DispatchError, DispatchReport, Dispatched,
    FallbackDispatcher, RemoteService, ServiceError,
};
pub use gemini::{GeminiConfig, GeminiService};
pub use image::{ImageBackend, ImageConfig, ImageService};
pub use presets::{Tool, UnknownPreset};
pub use product::{Platform, ProductAnalysis};
pub use quota::{Plan, QuotaReservation, QuotaTracker};
pub use render::{RenderSink, RenderedImage, ResponseSink};
