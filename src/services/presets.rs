//! Tool instructions and style tables
//!
//! Pure lookup data: each tool maps to an instruction template and,
//! for tools that take one, a table of accepted option labels. Image style
//! presets map a label to the suffix appended to the image prompt.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Text tools offered by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Plan a piece of content for a platform
    ContentPlan,
    /// Persuasive affiliate caption from product highlights
    AffiliateCaption,
    /// Five click-worthy titles for a clip
    ClipTitles,
    /// Reply to a fan comment in a chosen tone
    CommentReply,
    /// Translate an image description into an English image prompt
    ImagePrompt,
    /// Four-section product analysis
    ProductAnalysis,
}

impl Tool {
    /// Tools reachable through `POST /v1/tools/:tool`
    pub const TEXT_TOOLS: [Tool; 4] = [
        Tool::ContentPlan,
        Tool::AffiliateCaption,
        Tool::ClipTitles,
        Tool::CommentReply,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Tool::ContentPlan => "content_plan",
            Tool::AffiliateCaption => "affiliate_caption",
            Tool::ClipTitles => "clip_titles",
            Tool::CommentReply => "comment_reply",
            Tool::ImagePrompt => "image_prompt",
            Tool::ProductAnalysis => "product_analysis",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Tool::ContentPlan => {
                "Plan this content in detail: hook, outline, shot list and call to action."
            }
            Tool::AffiliateCaption => {
                "Write a punchy affiliate sales caption with fitting emoji from these product highlights:"
            }
            Tool::ClipTitles => "Suggest 5 viral clip titles for this topic:",
            Tool::CommentReply => "Write a reply to this fan comment:",
            Tool::ImagePrompt => {
                "Translate to English for an image generation prompt. Reply with the prompt only:"
            }
            Tool::ProductAnalysis => PRODUCT_ANALYSIS_INSTRUCTION,
        }
    }

    /// Accepted option labels and the fragment each adds to the prompt
    pub fn options(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Tool::ContentPlan => CONTENT_PLATFORMS,
            Tool::CommentReply => REPLY_TONES,
            _ => &[],
        }
    }

    /// Fragment for an option label; `None` means no option was given
    pub fn option_fragment(&self, label: Option<&str>) -> Result<&'static str, UnknownPreset> {
        let options = self.options();
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            None => Ok(options.first().map(|(_, fragment)| *fragment).unwrap_or("")),
            Some(label) => lookup(options, label).ok_or_else(|| UnknownPreset {
                kind: self.slug(),
                label: label.to_string(),
                accepted: options.iter().map(|(l, _)| *l).collect(),
            }),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Tool {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Tool::TEXT_TOOLS
            .iter()
            .find(|tool| tool.slug() == normalized)
            .copied()
            .ok_or_else(|| UnknownPreset {
                kind: "tool",
                label: s.to_string(),
                accepted: Tool::TEXT_TOOLS.iter().map(|t| t.slug()).collect(),
            })
    }
}

/// A label that is not in the relevant table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{label}', expected one of: {}", .accepted.join(", "))]
pub struct UnknownPreset {
    pub kind: &'static str,
    pub label: String,
    pub accepted: Vec<&'static str>,
}

const PRODUCT_ANALYSIS_INSTRUCTION: &str = "You are an expert in digital marketing and affiliate selling. \
Analyze the product below and answer in four numbered sections, using exactly these headers:\n\
1.) Key selling points - three points specific to this product\n\
2.) Caption - one persuasive sentence with fitting emoji\n\
3.) Hashtag - 6 to 8 hashtags for the real target audience\n\
4.) Tips - two techniques to increase sales based on the data shown";

/// Platforms for content plans
pub const CONTENT_PLATFORMS: &[(&str, &str)] = &[
    ("short_video", "Platform: short vertical video (TikTok / Reels)."),
    ("long_video", "Platform: long-form video (Facebook / YouTube)."),
    ("image_post", "Platform: image post with caption."),
];

/// Tones for comment replies
pub const REPLY_TONES: &[(&str, &str)] = &[
    ("polite", "Tone: polite and warm."),
    ("friendly", "Tone: casual and friendly."),
    ("playful", "Tone: playful and teasing."),
];

/// Image style presets
pub const IMAGE_STYLES: &[(&str, &str)] = &[
    ("none", ""),
    ("photo", "photorealistic, 35mm photograph, natural lighting, highly detailed"),
    ("anime", "anime style, vibrant colors, clean line art"),
    ("cinematic", "cinematic lighting, dramatic composition, film still"),
    ("watercolor", "watercolor painting, soft edges, paper texture"),
    ("3d", "3d render, octane render, studio lighting"),
    ("minimal", "minimalist flat illustration, pastel palette"),
];

/// Suffix for an image style label; missing label means no suffix
pub fn image_style(label: Option<&str>) -> Result<&'static str, UnknownPreset> {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        None => Ok(""),
        Some(label) => lookup(IMAGE_STYLES, label).ok_or_else(|| UnknownPreset {
            kind: "image style",
            label: label.to_string(),
            accepted: IMAGE_STYLES.iter().map(|(l, _)| *l).collect(),
        }),
    }
}

fn lookup(table: &'static [(&'static str, &'static str)], label: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(l, _)| l.eq_ignore_ascii_case(label))
        .map(|(_, fragment)| *fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_from_str() {
        assert_eq!("content_plan".parse::<Tool>().unwrap(), Tool::ContentPlan);
        assert_eq!("Clip-Titles".parse::<Tool>().unwrap(), Tool::ClipTitles);
        let err = "image_prompt".parse::<Tool>().unwrap_err();
        assert_eq!(err.kind, "tool");
        assert!(err.accepted.contains(&"comment_reply"));
    }

    #[test]
    fn test_option_defaults_to_first_entry() {
        assert_eq!(
            Tool::ContentPlan.option_fragment(None).unwrap(),
            CONTENT_PLATFORMS[0].1
        );
        assert_eq!(Tool::ClipTitles.option_fragment(None).unwrap(), "");
    }

    #[test]
    fn test_option_lookup_is_case_insensitive() {
        assert_eq!(
            Tool::CommentReply.option_fragment(Some("Playful")).unwrap(),
            "Tone: playful and teasing."
        );
    }

    #[test]
    fn test_unknown_option_lists_accepted_labels() {
        let err = Tool::CommentReply.option_fragment(Some("rude")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("rude"));
        assert!(message.contains("polite, friendly, playful"));
    }

    #[test]
    fn test_image_style() {
        assert_eq!(image_style(None).unwrap(), "");
        assert_eq!(image_style(Some("none")).unwrap(), "");
        assert!(image_style(Some("anime")).unwrap().contains("anime"));
        assert!(image_style(Some("oil")).is_err());
    }

    #[test]
    fn test_product_instruction_has_numbered_headers() {
        let instruction = Tool::ProductAnalysis.instruction();
        for header in ["1.)", "2.)", "3.)", "4.)"] {
            assert!(instruction.contains(header));
        }
    }
}
