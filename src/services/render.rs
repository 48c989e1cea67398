//! Rendering of results
//!
//! Handlers hand finished results to a [`RenderSink`]; the HTTP layer uses
//! [`ResponseSink`], which turns them into a response.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::sync::Mutex;

/// A generated image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedImage {
    /// Image bytes with their sniffed MIME type
    Bytes { data: Vec<u8>, mime_type: String },
    /// A URL that serves the image
    Reference { url: String },
}

impl RenderedImage {
    /// File extension matching the MIME type
    pub fn extension(&self) -> &'static str {
        match self {
            RenderedImage::Bytes { mime_type, .. } => extension_for(mime_type),
            RenderedImage::Reference { .. } => "png",
        }
    }

    pub fn base64(&self) -> Option<String> {
        match self {
            RenderedImage::Bytes { data, .. } => Some(STANDARD.encode(data)),
            RenderedImage::Reference { .. } => None,
        }
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Destination for finished results
pub trait RenderSink {
    fn render_text(&self, text: &str);
    fn render_image(&self, image: &RenderedImage);
}

/// Collects results and converts them into an HTTP response
#[derive(Debug, Default)]
pub struct ResponseSink {
    texts: Mutex<Vec<String>>,
    image: Mutex<Option<RenderedImage>>,
}

impl RenderSink for ResponseSink {
    fn render_text(&self, text: &str) {
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
    }

    fn render_image(&self, image: &RenderedImage) {
        if let Ok(mut slot) = self.image.lock() {
            *slot = Some(image.clone());
        }
    }
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rendered text, in render order
    pub fn text(&self) -> String {
        self.texts
            .lock()
            .map(|texts| texts.join("\n"))
            .unwrap_or_default()
    }

    pub fn image(&self) -> Option<RenderedImage> {
        self.image.lock().ok().and_then(|slot| slot.clone())
    }

    /// JSON response for any serializable body
    pub fn json<T: Serialize>(body: T) -> Response {
        (StatusCode::OK, Json(body)).into_response()
    }

    /// The rendered image as a file download
    ///
    /// A reference image becomes a redirect to its URL.
    pub fn download(&self) -> Response {
        match self.image() {
            Some(RenderedImage::Bytes { data, mime_type }) => {
                let disposition = format!(
                    "attachment; filename=\"ai_img.{}\"",
                    extension_for(&mime_type)
                );
                let mut response = (StatusCode::OK, data).into_response();
                let headers = response.headers_mut();
                if let Ok(value) = HeaderValue::from_str(&mime_type) {
                    headers.insert(header::CONTENT_TYPE, value);
                }
                if let Ok(value) = HeaderValue::from_str(&disposition) {
                    headers.insert(header::CONTENT_DISPOSITION, value);
                }
                response
            }
            Some(RenderedImage::Reference { url }) => {
                let mut response = StatusCode::FOUND.into_response();
                if let Ok(value) = HeaderValue::from_str(&url) {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                response
            }
            None => StatusCode::NO_CONTENT.into_response(),
        }
    }
}
