//! Source platform detection for submitted URLs.
//!
//! Each supported platform carries the format-selection expression, referer
//! and extractor options the external tool needs for it.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// A source service whose URLs the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Youtube,
    Instagram,
    Facebook,
}

/// All platforms, in detection order.
pub const ALL_PLATFORMS: &[Platform] = &[
    Platform::Tiktok,
    Platform::Youtube,
    Platform::Instagram,
    Platform::Facebook,
];

/// Best merged video+audio, then the best single stream.
const FORMAT_MERGED_OR_BEST: &str = "bv*+ba/best/bestvideo+bestaudio/best";

/// YouTube always offers separate streams, so the merged pair comes first.
const FORMAT_YOUTUBE: &str = "bv*+ba/bestvideo+bestaudio/best";

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }

    /// Format-selection expression passed to `-f`.
    pub fn format_selector(self) -> &'static str {
        match self {
            Platform::Youtube => FORMAT_YOUTUBE,
            Platform::Tiktok | Platform::Instagram | Platform::Facebook => FORMAT_MERGED_OR_BEST,
        }
    }

    /// Referer header value sent with every request.
    pub fn referer(self) -> &'static str {
        match self {
            Platform::Tiktok => "https://www.tiktok.com/",
            Platform::Youtube => "https://www.youtube.com/",
            Platform::Instagram => "https://www.instagram.com/",
            Platform::Facebook => "https://www.facebook.com/",
        }
    }

    /// Platform-specific `--extractor-args` value, if any.
    pub fn extractor_args(self) -> Option<&'static str> {
        match self {
            Platform::Tiktok => Some("tiktok:hd=1"),
            _ => None,
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Platform::Tiktok => &TIKTOK_RE,
            Platform::Youtube => &YOUTUBE_RE,
            Platform::Instagram => &INSTAGRAM_RE,
            Platform::Facebook => &FACEBOOK_RE,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

static TIKTOK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(https?://)?(www\.|m\.|vm\.|vt\.)?tiktok\.com/").expect("valid regex")
});

static YOUTUBE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(https?://)?(www\.|m\.)?(youtube\.com|youtu\.be)/").expect("valid regex")
});

static INSTAGRAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(https?://)?(www\.)?instagram\.com/").expect("valid regex")
});

static FACEBOOK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(https?://)?(www\.|m\.)?(facebook\.com|fb\.watch)/").expect("valid regex")
});

/// Classify a URL into a supported platform.
pub fn detect_platform(url: &str) -> Option<Platform> {
    let url = url.trim();
    ALL_PLATFORMS
        .iter()
        .copied()
        .find(|p| p.pattern().is_match(url))
}

/// Validate a submitted URL and return its platform.
pub fn validate_media_url(url: &str) -> Result<Platform, CoreError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("A URL is required".to_string()));
    }
    detect_platform(trimmed).ok_or_else(|| {
        CoreError::Validation(
            "Unsupported URL. Provide a TikTok, YouTube, Instagram or Facebook link.".to_string(),
        )
    })
}
