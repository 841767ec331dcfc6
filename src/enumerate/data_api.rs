//! Newest-first enumeration through the channel's uploads playlist.
//!
//! Only meaningful for `recent` mode: the Data API has no popularity-sorted
//! listing. Handles and channel IDs resolve through `channels.list`; legacy
//! custom URLs resolve only for `/user/` names.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    ChannelEnumerator, Listing, RefItem, ShortsFilter, TraversalMode,
    VideoRefStream, STREAM_CAPACITY,
};
use crate::error::EnumerationError;
use crate::models::VideoRef;
use crate::utils::{channel_key, ChannelKey};
use crate::youtube_api::{ApiFailure, DataApiClient, MAX_PAGE_SIZE};

pub struct DataApiEnumerator {
    api: DataApiClient,
}

impl DataApiEnumerator {
    pub fn new(api: DataApiClient) -> Self {
        Self { api }
    }

    /// Resolve a canonical base to its uploads playlist ID.
    pub async fn uploads_playlist(&self, base: &str) -> Result<String, EnumerationError> {
        let key = channel_key(base)
            .ok_or_else(|| EnumerationError::unresolvable(base, "no channel identifier in URL"))?;

        let (param, value) = match &key {
            ChannelKey::Handle(handle) => ("forHandle", format!("@{}", handle)),
            ChannelKey::Id(id) => ("id", id.clone()),
            ChannelKey::Legacy(name) if base.contains("/user/") => ("forUsername", name.clone()),
            ChannelKey::Legacy(_) => {
                return Err(EnumerationError::unresolvable(
                    base,
                    "custom channel URLs cannot be resolved through the Data API",
                ))
            }
        };

        let body = self
            .api
            .get("channels", &[("part", "contentDetails"), (param, value.as_str())])
            .await
            .map_err(|e| api_failure(base, e))?;

        body["items"][0]["contentDetails"]["relatedPlaylists"]["uploads"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| EnumerationError::unresolvable(base, "channel has no uploads playlist"))
    }
}

fn api_failure(reference: &str, failure: ApiFailure) -> EnumerationError {
    match failure {
        ApiFailure::Quota(detail) => EnumerationError::QuotaExceeded(detail),
        ApiFailure::Transport(err) => EnumerationError::Transport(err),
        ApiFailure::Http { status: 404, message } => {
            EnumerationError::unresolvable(reference, message)
        }
        other => EnumerationError::Layout(other.to_string()),
    }
}

/// Extract `VideoRef`s from one `playlistItems.list` page.
fn page_refs(page: &Value, listing: &Listing, next_order: &mut usize) -> Vec<VideoRef> {
    let Some(items) = page["items"].as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let id = item["contentDetails"]["videoId"]
                .as_str()
                .or_else(|| item["snippet"]["resourceId"]["videoId"].as_str())?;
            let mut video = VideoRef::new(id, *next_order).with_listing(listing.index, &listing.url);
            video.hint_title = item["snippet"]["title"].as_str().map(str::to_string);
            *next_order += 1;
            Some(video)
        })
        .collect()
}

#[async_trait]
impl ChannelEnumerator for DataApiEnumerator {
    async fn enumerate(
        &self,
        base: &str,
        mode: TraversalMode,
        cap: usize,
    ) -> Result<VideoRefStream, EnumerationError> {
        if mode != TraversalMode::Recent {
            return Err(EnumerationError::unresolvable(
                base,
                format!("the Data API cannot list uploads in {} order", mode.as_str()),
            ));
        }

        let playlist_id = self.uploads_playlist(base).await?;
        info!("Resolved {} to uploads playlist {}", base, playlist_id);

        let listing = Listing {
            index: 0,
            url: format!("https://www.youtube.com/playlist?list={}", playlist_id),
            popularity_sorted: false,
            filter: ShortsFilter::Any,
        };

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let api = self.api.clone();
        let reference = base.to_string();
        let producer_listing = listing.clone();
        tokio::spawn(async move {
            page_uploads(api, reference, playlist_id, producer_listing, cap, tx).await;
        });

        Ok(VideoRefStream::new(rx, vec![listing]))
    }

    fn name(&self) -> &'static str {
        "data-api"
    }
}

async fn page_uploads(
    api: DataApiClient,
    reference: String,
    playlist_id: String,
    listing: Listing,
    cap: usize,
    tx: mpsc::Sender<RefItem>,
) {
    let page_size = MAX_PAGE_SIZE.to_string();
    let mut page_token: Option<String> = None;
    let mut order = 0usize;

    while order < cap {
        let mut params: Vec<(&str, &str)> = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id.as_str()),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = &page_token {
            params.push(("pageToken", token.as_str()));
        }

        let page = match api.get("playlistItems", &params).await {
            Ok(page) => page,
            Err(failure) => {
                warn!("Uploads page request failed: {}", failure);
                let _ = tx.send(Err(api_failure(&reference, failure))).await;
                return;
            }
        };

        for video in page_refs(&page, &listing, &mut order) {
            if video.discovered_order >= cap {
                return;
            }
            if tx.send(Ok(video)).await.is_err() {
                debug!("Enumeration stream dropped; stopping uploads paging");
                return;
            }
        }

        page_token = page["nextPageToken"].as_str().map(str::to_string);
        if page_token.is_none() {
            return;
        }
    }
}
