//! Product link analysis
//!
//! Detects the marketplace of a product URL, pulls a best-effort plain-text
//! snapshot of the page for the prompt, and splits the model's four-section
//! answer back into fields.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::utils::string::{collapse_whitespace, truncate_str};

/// Default cap on page text sent to the model, in characters
pub const DEFAULT_PAGE_TEXT_MAX_CHARS: usize = 3000;

/// Timeout for fetching the product page
pub const PAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

// ============================================================================
// Platform Detection
// ============================================================================

/// Supported marketplaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    TikTok,
    Shopee,
    Lazada,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::TikTok, Platform::Shopee, Platform::Lazada];

    fn domain(&self) -> &'static str {
        match self {
            Platform::TikTok => "tiktok.com",
            Platform::Shopee => "shopee.co.th",
            Platform::Lazada => "lazada.co.th",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::TikTok => "TikTok",
            Platform::Shopee => "Shopee",
            Platform::Lazada => "Lazada",
        };
        f.write_str(name)
    }
}

/// Marketplace of `url`, matched on the host (subdomains included)
pub fn detect_platform(url: &str) -> Option<Platform> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Platform::ALL.into_iter().find(|platform| {
        let domain = platform.domain();
        host == domain || host.ends_with(&format!(".{}", domain))
    })
}

// ============================================================================
// Page Text
// ============================================================================

static NOISE_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<nav\b.*?</nav\s*>|<footer\b.*?</footer\s*>|<header\b.*?</header\s*>|<!--.*?-->",
    )
    .expect("valid noise block regex")
});

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

/// Visible text of an HTML document, truncated to `max_chars` characters
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let without_noise = NOISE_BLOCKS.replace_all(html, " ");
    let without_tags = TAGS.replace_all(&without_noise, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let text = collapse_whitespace(&decoded);
    truncate_str(&text, max_chars).to_string()
}

/// Fetch the product page and reduce it to plain text
///
/// Failures are not errors for the caller: the prompt then asks the model to
/// work from the URL alone.
pub async fn fetch_page_text(client: &Client, url: &str, max_chars: usize) -> Option<String> {
    let response = match client
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .timeout(PAGE_FETCH_TIMEOUT)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Product page fetch failed");
            return None;
        }
    };

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Product page body unreadable");
            return None;
        }
    };

    let text = html_to_text(&body, max_chars);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// User-text part of the analysis prompt
pub fn analysis_input(platform: Platform, url: &str, page_text: Option<&str>) -> String {
    format!(
        "Platform: {}\nURL: {}\nPage data: {}",
        platform,
        url,
        page_text.unwrap_or("not available, analyze from the URL")
    )
}

// ============================================================================
// Answer Parsing
// ============================================================================

/// The four sections of a product analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductAnalysis {
    pub points: String,
    pub caption: String,
    pub hashtags: String,
    pub tips: String,
}

impl ProductAnalysis {
    /// Caption and hashtags ready to paste into a post
    pub fn share_text(&self) -> Option<String> {
        if self.caption.is_empty() || self.hashtags.is_empty() {
            return None;
        }
        Some(format!("{}\n\n{}", self.caption, self.hashtags))
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
            && self.caption.is_empty()
            && self.hashtags.is_empty()
            && self.tips.is_empty()
    }
}

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^[\s*#]*([1-4])\s*[.)]+\s*\**\s*(?:key selling|selling point|highlight|จุดเด่น|caption|แคปชั่น|hashtag|tip|คำแนะนำ)[^\n]*$",
    )
    .expect("valid section header regex")
});

/// Split a model answer into its numbered sections
///
/// A section runs from the end of its header line to the start of the next
/// header. Missing sections stay empty; hashtags are joined onto one line.
pub fn parse_analysis(text: &str) -> ProductAnalysis {
    let headers: Vec<(u8, usize, usize)> = SECTION_HEADER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?.as_str().parse::<u8>().ok()?;
            Some((number, whole.start(), whole.end()))
        })
        .collect();

    let mut analysis = ProductAnalysis::default();

    for (i, (number, _, body_start)) in headers.iter().enumerate() {
        let body_end = headers.get(i + 1).map(|(_, start, _)| *start).unwrap_or(text.len());
        let body = text[*body_start..body_end].trim();

        let slot = match number {
            1 => &mut analysis.points,
            2 => &mut analysis.caption,
            3 => &mut analysis.hashtags,
            _ => &mut analysis.tips,
        };
        if slot.is_empty() {
            *slot = body.to_string();
        }
    }

    analysis.hashtags = collapse_whitespace(&analysis.hashtags);
    analysis
}
