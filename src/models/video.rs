//! Video identity and metadata models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A video discovered during channel enumeration.
///
/// Only `video_id` and `discovered_order` identify the video. The `hint_*`
/// fields are whatever the listing exposed for free and are never trusted as
/// metadata for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub video_id: String,
    /// Position in the enumeration stream, starting at 0.
    pub discovered_order: usize,
    /// Index of the listing URL that produced this reference.
    pub listing: usize,
    pub listing_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_url: Option<String>,
}

impl VideoRef {
    pub fn new(video_id: impl Into<String>, discovered_order: usize) -> Self {
        Self {
            video_id: video_id.into(),
            discovered_order,
            listing: 0,
            listing_url: String::new(),
            hint_title: None,
            hint_duration_secs: None,
            hint_url: None,
        }
    }

    pub fn with_listing(mut self, listing: usize, listing_url: impl Into<String>) -> Self {
        self.listing = listing;
        self.listing_url = listing_url.into();
        self
    }

    /// Canonical watch URL for this video.
    pub fn watch_url(&self) -> String {
        watch_url(&self.video_id)
    }
}

/// Canonical watch URL for a video ID.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Thumbnail resolution tiers, in ascending size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailTier {
    Default,
    Medium,
    High,
    Standard,
    Maxres,
}

impl ThumbnailTier {
    pub const ALL: [ThumbnailTier; 5] = [
        Self::Default,
        Self::Medium,
        Self::High,
        Self::Standard,
        Self::Maxres,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Standard => "standard",
            Self::Maxres => "maxres",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "standard" => Some(Self::Standard),
            "maxres" => Some(Self::Maxres),
            _ => None,
        }
    }

    /// Tier of a canonical i.ytimg image, read from its file name
    /// (`hqdefault.jpg` is `high`). Resized variants carry a query string
    /// and other names (`hq720`, `frame0`) have no tier; both give `None`.
    pub fn from_image_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        if parsed.query().is_some() || !parsed.host_str()?.ends_with("ytimg.com") {
            return None;
        }
        let file = parsed.path_segments()?.last()?;
        let stem = file
            .strip_suffix(".jpg")
            .or_else(|| file.strip_suffix(".webp"))?;
        match stem {
            "default" => Some(Self::Default),
            "mqdefault" => Some(Self::Medium),
            "hqdefault" => Some(Self::High),
            "sddefault" => Some(Self::Standard),
            "maxresdefault" => Some(Self::Maxres),
            _ => None,
        }
    }
}

/// Per-video attributes normalized from any backend.
///
/// Every optional field is `None` when the source omitted it. Nothing here is
/// ever filled with a placeholder value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    /// Duration in seconds.
    pub duration_secs: Option<u64>,
    /// Duration as reported by the source (e.g. `PT4M13S`).
    pub duration_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub default_language: Option<String>,
    pub default_audio_language: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_urls: BTreeMap<ThumbnailTier, String>,
}

impl VideoMetadata {
    pub fn new(video_id: impl Into<String>) -> Self {
        let video_id = video_id.into();
        Self {
            url: watch_url(&video_id),
            video_id,
            ..Default::default()
        }
    }

    pub fn thumbnail(&self, tier: ThumbnailTier) -> Option<&str> {
        self.thumbnail_urls.get(&tier).map(|s| s.as_str())
    }
}

/// Which backend produced a metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Authoritative,
    BestEffort,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authoritative => "authoritative",
            Self::BestEffort => "best_effort",
        }
    }
}

/// How a best-effort view count was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewCountQuality {
    /// A full integer from structured page data.
    Exact,
    /// Parsed from an abbreviated display string like "1.2M views".
    Approximate,
    /// The page did not expose a view count.
    Missing,
}

/// Metadata tagged with the backend that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcedMetadata {
    Authoritative(VideoMetadata),
    BestEffort {
        metadata: VideoMetadata,
        views: ViewCountQuality,
    },
}

impl SourcedMetadata {
    pub fn metadata(&self) -> &VideoMetadata {
        match self {
            Self::Authoritative(metadata) => metadata,
            Self::BestEffort { metadata, .. } => metadata,
        }
    }

    pub fn into_metadata(self) -> VideoMetadata {
        match self {
            Self::Authoritative(metadata) => metadata,
            Self::BestEffort { metadata, .. } => metadata,
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            Self::Authoritative(_) => Provenance::Authoritative,
            Self::BestEffort { .. } => Provenance::BestEffort,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.metadata().video_id
    }

    pub fn view_count(&self) -> Option<u64> {
        self.metadata().view_count
    }

    /// Whether the view count can be used as evidence for early stopping.
    ///
    /// Authoritative counts and exact best-effort counts qualify; approximate
    /// or missing counts do not.
    pub fn views_trusted(&self) -> bool {
        match self {
            Self::Authoritative(metadata) => metadata.view_count.is_some(),
            Self::BestEffort { metadata, views } => {
                *views == ViewCountQuality::Exact && metadata.view_count.is_some()
            }
        }
    }
}
