//! Best-effort metadata scraped from the watch page.
//!
//! `videoDetails` and `microformat.playerMicroformatRenderer` carry most
//! fields. When `videoDetails.viewCount` is absent the rendered view counter
//! in `ytInitialData` is parsed instead, which may be abbreviated.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::{MetadataProvider, VideoOutcome};
use crate::error::MetadataError;
use crate::http_client::Fetch;
use crate::models::{
    Provenance, SourcedMetadata, ThumbnailTier, VideoMetadata, VideoRef, ViewCountQuality,
};
use crate::utils::parse_view_count_detailed;
use crate::watch_page::{fetch_watch_page, WatchPage};

pub struct WatchPageProvider {
    fetch: Arc<dyn Fetch>,
}

impl WatchPageProvider {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self { fetch }
    }

    async fn fetch_one(&self, video: &VideoRef) -> VideoOutcome {
        let id = video.video_id.as_str();
        let (response, page) = fetch_watch_page(self.fetch.as_ref(), id)
            .await
            .map_err(|e| MetadataError::unavailable(id, e.to_string()))?;

        if response.status == 429 || page.captcha {
            warn!("Watch page for {} was blocked (HTTP {})", id, response.status);
            return Err(MetadataError::unavailable(id, "watch page blocked"));
        }
        if !response.is_success() {
            return Err(MetadataError::unavailable(
                id,
                format!("watch page returned HTTP {}", response.status),
            ));
        }
        parse_watch_metadata(id, &page).map_err(|reason| MetadataError::unavailable(id, reason))
    }
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Depth-first search for the first object stored under `key`.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

fn runs_text(value: &Value) -> Option<String> {
    if let Some(simple) = value["simpleText"].as_str() {
        return Some(simple.to_string());
    }
    let runs = value["runs"].as_array()?;
    Some(runs.iter().filter_map(|r| r["text"].as_str()).collect())
}

/// View count from the rendered counter in `ytInitialData`.
fn rendered_view_count(initial_data: &Value) -> Option<(u64, ViewCountQuality)> {
    let renderer = find_key(initial_data, "videoViewCountRenderer")?;
    let display = runs_text(&renderer["viewCount"]).or_else(|| runs_text(&renderer["shortViewCount"]))?;
    let parsed = parse_view_count_detailed(&display)?;
    let quality = if parsed.approximate {
        ViewCountQuality::Approximate
    } else {
        ViewCountQuality::Exact
    };
    Some((parsed.value, quality))
}

/// Build best-effort metadata from a parsed watch page.
pub fn parse_watch_metadata(video_id: &str, page: &WatchPage) -> Result<SourcedMetadata, String> {
    let player = page
        .player_response
        .as_ref()
        .ok_or_else(|| "no player response on watch page".to_string())?;

    let details = &player["videoDetails"];
    if details.is_null() {
        let reason = page
            .playability()
            .map(|p| format!("{}: {}", p.status, p.reason.unwrap_or_default()))
            .unwrap_or_else(|| "no videoDetails".to_string());
        return Err(reason);
    }
    if details["videoId"].as_str().is_some_and(|id| id != video_id) {
        return Err(format!(
            "watch page describes {} instead",
            details["videoId"].as_str().unwrap_or_default()
        ));
    }
    let micro = &player["microformat"]["playerMicroformatRenderer"];

    let mut metadata = VideoMetadata::new(video_id);
    metadata.title = text(&details["title"])
        .or_else(|| runs_text(&micro["title"]))
        .unwrap_or_default();
    metadata.channel_id = text(&details["channelId"]).or_else(|| text(&micro["externalChannelId"]));
    metadata.channel_title = text(&details["author"]).or_else(|| text(&micro["ownerChannelName"]));
    metadata.description = text(&details["shortDescription"]);
    metadata.duration_text = text(&details["lengthSeconds"]).or_else(|| text(&micro["lengthSeconds"]));
    metadata.duration_secs = metadata.duration_text.as_deref().and_then(|s| s.parse().ok());
    metadata.tags = details["keywords"]
        .as_array()
        .map(|k| k.iter().filter_map(text).collect())
        .unwrap_or_default();
    metadata.categories = text(&micro["category"]).into_iter().collect();
    metadata.published_at = text(&micro["publishDate"])
        .or_else(|| text(&micro["uploadDate"]))
        .as_deref()
        .and_then(parse_publish_date);

    if let Some(thumbs) = details["thumbnail"]["thumbnails"].as_array() {
        for thumb in thumbs {
            if let Some(url) = text(&thumb["url"]) {
                if let Some(tier) = ThumbnailTier::from_image_url(&url) {
                    metadata.thumbnail_urls.entry(tier).or_insert(url);
                }
            }
        }
    }

    let exact = text(&details["viewCount"]).and_then(|s| s.parse::<u64>().ok());
    let views = match exact {
        Some(count) => {
            metadata.view_count = Some(count);
            ViewCountQuality::Exact
        }
        None => match page.initial_data.as_ref().and_then(rendered_view_count) {
            Some((count, quality)) => {
                metadata.view_count = Some(count);
                quality
            }
            None => ViewCountQuality::Missing,
        },
    };
    debug!("Watch page metadata for {}: views {:?} ({:?})", video_id, metadata.view_count, views);

    Ok(SourcedMetadata::BestEffort { metadata, views })
}

#[async_trait]
impl MetadataProvider for WatchPageProvider {
    async fn fetch_batch(&self, refs: &[VideoRef]) -> Result<Vec<VideoOutcome>, MetadataError> {
        let mut outcomes = Vec::with_capacity(refs.len());
        for video in refs {
            outcomes.push(self.fetch_one(video).await);
        }
        Ok(outcomes)
    }

    fn batch_size(&self) -> usize {
        1
    }

    fn provenance(&self) -> Provenance {
        Provenance::BestEffort
    }

    fn name(&self) -> &'static str {
        "watch-page"
    }
}
