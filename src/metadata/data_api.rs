//! Authoritative metadata from `videos.list`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::{MetadataProvider, VideoOutcome};
use crate::error::MetadataError;
use crate::models::{Provenance, SourcedMetadata, ThumbnailTier, VideoMetadata, VideoRef};
use crate::utils::parse_iso8601_duration;
use crate::youtube_api::{category_name, ApiFailure, DataApiClient, MAX_PAGE_SIZE};

pub struct DataApiProvider {
    api: DataApiClient,
}

impl DataApiProvider {
    pub fn new(api: DataApiClient) -> Self {
        Self { api }
    }

    async fn fetch_chunk(&self, refs: &[VideoRef]) -> Result<Vec<VideoOutcome>, MetadataError> {
        let ids = refs
            .iter()
            .map(|r| r.video_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let body = self
            .api
            .get(
                "videos",
                &[
                    ("part", "snippet,contentDetails,statistics"),
                    ("id", ids.as_str()),
                    ("maxResults", "50"),
                ],
            )
            .await
            .map_err(|failure| match failure {
                ApiFailure::Quota(detail) => MetadataError::QuotaExceeded(detail),
                other => MetadataError::Transport(other.to_string()),
            })?;

        let mut by_id: HashMap<String, VideoMetadata> = body["items"]
            .as_array()
            .map(|items| items.iter().filter_map(parse_video_item))
            .into_iter()
            .flatten()
            .map(|m| (m.video_id.clone(), m))
            .collect();
        debug!("videos.list returned {} of {} IDs", by_id.len(), refs.len());

        Ok(refs
            .iter()
            .map(|r| match by_id.remove(&r.video_id) {
                Some(metadata) => Ok(SourcedMetadata::Authoritative(metadata)),
                None => Err(MetadataError::unavailable(
                    &r.video_id,
                    "not returned by videos.list (private, deleted or invalid)",
                )),
            })
            .collect())
    }
}

fn count(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Normalize one `videos.list` item. Returns `None` for items without an ID.
pub fn parse_video_item(item: &Value) -> Option<VideoMetadata> {
    let id = item["id"].as_str()?;
    let snippet = &item["snippet"];
    let statistics = &item["statistics"];

    let mut metadata = VideoMetadata::new(id);
    metadata.title = snippet["title"].as_str().unwrap_or_default().to_string();
    metadata.published_at = snippet["publishedAt"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    metadata.channel_id = text(&snippet["channelId"]);
    metadata.channel_title = text(&snippet["channelTitle"]);
    metadata.description = text(&snippet["description"]);
    metadata.default_language = text(&snippet["defaultLanguage"]);
    metadata.default_audio_language = text(&snippet["defaultAudioLanguage"]);
    metadata.tags = snippet["tags"]
        .as_array()
        .map(|tags| tags.iter().filter_map(text).collect())
        .unwrap_or_default();
    metadata.categories = snippet["categoryId"]
        .as_str()
        .map(|id| vec![category_name(id)])
        .unwrap_or_default();

    for tier in ThumbnailTier::ALL {
        if let Some(url) = text(&snippet["thumbnails"][tier.as_str()]["url"]) {
            metadata.thumbnail_urls.insert(tier, url);
        }
    }

    metadata.view_count = count(&statistics["viewCount"]);
    metadata.like_count = count(&statistics["likeCount"]);
    metadata.comment_count = count(&statistics["commentCount"]);

    metadata.duration_text = text(&item["contentDetails"]["duration"]);
    metadata.duration_secs = metadata
        .duration_text
        .as_deref()
        .and_then(parse_iso8601_duration);

    Some(metadata)
}

#[async_trait]
impl MetadataProvider for DataApiProvider {
    async fn fetch_batch(&self, refs: &[VideoRef]) -> Result<Vec<VideoOutcome>, MetadataError> {
        let mut outcomes = Vec::with_capacity(refs.len());
        for chunk in refs.chunks(MAX_PAGE_SIZE) {
            outcomes.extend(self.fetch_chunk(chunk).await?);
        }
        Ok(outcomes)
    }

    fn batch_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    fn provenance(&self) -> Provenance {
        Provenance::Authoritative
    }

    fn name(&self) -> &'static str {
        "data-api"
    }
}
