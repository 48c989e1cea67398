//! Prompt composition
//!
//! Builds the outbound request text from an instruction, the user's text and
//! an optional style fragment. Composition is pure: no I/O, no failure for
//! any string input, and no bytes of the user's text are altered or dropped.
//! Blank input is rejected by request validation before this module is
//! reached.

use serde::{Deserialize, Serialize};

/// Separator placed between non-empty prompt parts
pub const PART_SEPARATOR: &str = "\n\n";

/// Target size for image generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ImageDimensions {
    fn default() -> Self {
        Self::new(1024, 1024)
    }
}

/// The composed request sent to a remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestPayload {
    /// Final prompt text
    pub prompt: String,

    /// Style fragment that was appended, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    /// Image size, for image services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<ImageDimensions>,

    /// Deterministic seed, for image services that support one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl RequestPayload {
    /// A payload carrying only prompt text
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: None,
            dimensions: None,
            seed: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: ImageDimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Compose `instruction`, `user_text` and `style_fragment`, in that order
///
/// Empty parts are skipped; the remaining parts are joined with a blank line.
pub fn compose(user_text: &str, style_fragment: &str, instruction_template: &str) -> RequestPayload {
    let prompt = [instruction_template, user_text, style_fragment]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(PART_SEPARATOR);

    RequestPayload {
        prompt,
        style: (!style_fragment.is_empty()).then(|| style_fragment.to_string()),
        dimensions: None,
        seed: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_order() {
        let payload = compose("a cat astronaut", "photorealistic", "Translate to English:");
        assert_eq!(
            payload.prompt,
            "Translate to English:\n\na cat astronaut\n\nphotorealistic"
        );
        assert_eq!(payload.style.as_deref(), Some("photorealistic"));
    }

    #[test]
    fn test_compose_skips_empty_parts() {
        let payload = compose("just text", "", "");
        assert_eq!(payload.prompt, "just text");
        assert!(payload.style.is_none());
    }

    #[test]
    fn test_compose_is_pure() {
        let a = compose("แมวใส่ชุดนักบินอวกาศ", "anime", "Instruction");
        let b = compose("แมวใส่ชุดนักบินอวกาศ", "anime", "Instruction");
        assert_eq!(a, b);
        assert_eq!(a.prompt.as_bytes(), b.prompt.as_bytes());
    }

    #[test]
    fn test_compose_preserves_user_bytes() {
        let user_text = "  line one\nline two {input} 🎬  ";
        let long_text = user_text.repeat(2_000);
        let payload = compose(&long_text, "style", "inst");
        assert!(payload.prompt.contains(&long_text));
        assert_eq!(
            payload.prompt.len(),
            "inst".len() + long_text.len() + "style".len() + 2 * PART_SEPARATOR.len()
        );
    }

    #[test]
    fn test_payload_builders() {
        let payload = compose("x", "", "")
            .with_dimensions(ImageDimensions::new(540, 960))
            .with_seed(Some(42));
        assert_eq!(payload.dimensions, Some(ImageDimensions::new(540, 960)));
        assert_eq!(payload.seed, Some(42));
    }
}
