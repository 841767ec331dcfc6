//! Channel enumeration: turning a channel reference into a stream of
//! [`VideoRef`]s in the listing's native order.
//!
//! The listing plan for each [`TraversalMode`] is derived from the canonical
//! base produced by [`normalize_channel_url`](crate::utils::normalize_channel_url).
//! Streams are lazy and bounded: producers block once the channel is full and
//! stop when the receiver is dropped.

mod data_api;
mod ytdlp;

pub use data_api::DataApiEnumerator;
pub use ytdlp::{parse_flat_entry, FlatEntry, YtDlpEnumerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::EnumerationError;
use crate::models::VideoRef;
use crate::utils::join_tab;

/// Bounded buffer between an enumeration producer and the pipeline.
pub const STREAM_CAPACITY: usize = 64;

/// Longest duration (seconds) still classified as a Short.
pub const SHORTS_MAX_SECS: u64 = 60;

/// Order and content of the listing(s) to enumerate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TraversalMode {
    /// Uploads sorted by popularity, most viewed first.
    #[default]
    Popular,
    /// Uploads newest first.
    Recent,
    /// Shorts only, most viewed first.
    Shorts,
    /// Regular uploads only (Shorts filtered out), most viewed first.
    Longform,
    /// Long-form listing followed by the Shorts listing.
    Both,
}

impl TraversalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Popular => "popular",
            Self::Recent => "recent",
            Self::Shorts => "shorts",
            Self::Longform => "longform",
            Self::Both => "both",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "popular" => Some(Self::Popular),
            "recent" => Some(Self::Recent),
            "shorts" => Some(Self::Shorts),
            "longform" | "videos" => Some(Self::Longform),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// Whether every listing in this mode is sorted by views descending.
    pub fn is_popularity_sorted(&self) -> bool {
        !matches!(self, Self::Recent)
    }
}

/// Which entries a listing keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShortsFilter {
    Any,
    OnlyShorts,
    ExcludeShorts,
}

impl ShortsFilter {
    /// Decide whether an entry passes. `is_short` is `None` when the listing
    /// gave no URL or duration to judge by; such entries are kept.
    pub fn admits(&self, is_short: Option<bool>) -> bool {
        match (self, is_short) {
            (Self::Any, _) | (_, None) => true,
            (Self::OnlyShorts, Some(short)) => short,
            (Self::ExcludeShorts, Some(short)) => !short,
        }
    }
}

/// One listing URL in a run's enumeration plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub index: usize,
    pub url: String,
    pub popularity_sorted: bool,
    pub filter: ShortsFilter,
}

const POPULAR_VIDEOS: &str = "videos?view=0&sort=p&flow=grid";
const POPULAR_SHORTS: &str = "shorts?view=0&sort=p&flow=grid";
const RECENT_VIDEOS: &str = "videos";

/// Listing URLs for a canonical channel base, in scan order.
pub fn listing_plan(base: &str, mode: TraversalMode) -> Vec<Listing> {
    let specs: Vec<(&str, bool, ShortsFilter)> = match mode {
        TraversalMode::Popular => vec![(POPULAR_VIDEOS, true, ShortsFilter::Any)],
        TraversalMode::Recent => vec![(RECENT_VIDEOS, false, ShortsFilter::Any)],
        TraversalMode::Shorts => vec![(POPULAR_SHORTS, true, ShortsFilter::OnlyShorts)],
        TraversalMode::Longform => vec![(POPULAR_VIDEOS, true, ShortsFilter::ExcludeShorts)],
        TraversalMode::Both => vec![
            (POPULAR_VIDEOS, true, ShortsFilter::ExcludeShorts),
            (POPULAR_SHORTS, true, ShortsFilter::OnlyShorts),
        ],
    };
    specs
        .into_iter()
        .enumerate()
        .map(|(index, (tab, popularity_sorted, filter))| Listing {
            index,
            url: join_tab(base, tab),
            popularity_sorted,
            filter,
        })
        .collect()
}

/// Classify an entry as a Short from its URL and duration.
pub fn classify_short(url: Option<&str>, duration_secs: Option<u64>) -> Option<bool> {
    if url.is_some_and(|u| u.contains("/shorts/")) {
        return Some(true);
    }
    duration_secs.map(|d| d <= SHORTS_MAX_SECS)
}

pub type RefItem = Result<VideoRef, EnumerationError>;

/// Lazy, finite, non-restartable sequence of video references.
pub struct VideoRefStream {
    receiver: mpsc::Receiver<RefItem>,
    listings: Vec<Listing>,
}

impl VideoRefStream {
    pub fn new(receiver: mpsc::Receiver<RefItem>, listings: Vec<Listing>) -> Self {
        for listing in &listings {
            info!("Listing {}: {}", listing.index, listing.url);
        }
        Self {
            receiver,
            listings,
        }
    }

    /// A stream over a fixed set of references.
    pub fn from_refs(listings: Vec<Listing>, refs: Vec<VideoRef>) -> Self {
        let (tx, rx) = mpsc::channel(refs.len().max(1));
        for video in refs {
            // Capacity equals the item count, so this cannot fill up.
            let _ = tx.try_send(Ok(video));
        }
        Self::new(rx, listings)
    }

    pub async fn next(&mut self) -> Option<RefItem> {
        self.receiver.recv().await
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn listing_urls(&self) -> Vec<String> {
        self.listings.iter().map(|l| l.url.clone()).collect()
    }
}

/// Source of candidate videos for a channel.
#[async_trait]
pub trait ChannelEnumerator: Send + Sync {
    /// Start enumerating `base` (a canonical channel URL). `cap` bounds how
    /// many references each listing may yield.
    async fn enumerate(
        &self,
        base: &str,
        mode: TraversalMode,
        cap: usize,
    ) -> Result<VideoRefStream, EnumerationError>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.youtube.com/@x";

    #[test]
    fn test_listing_plan_popular() {
        let plan = listing_plan(BASE, TraversalMode::Popular);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].url, "https://www.youtube.com/@x/videos?view=0&sort=p&flow=grid");
        assert!(plan[0].popularity_sorted);
    }

    #[test]
    fn test_listing_plan_recent_is_not_popularity_sorted() {
        let plan = listing_plan(BASE, TraversalMode::Recent);
        assert_eq!(plan[0].url, "https://www.youtube.com/@x/videos");
        assert!(!plan[0].popularity_sorted);
    }

    #[test]
    fn test_listing_plan_both_orders_longform_then_shorts() {
        let plan = listing_plan(BASE, TraversalMode::Both);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].filter, ShortsFilter::ExcludeShorts);
        assert_eq!(plan[1].url, "https://www.youtube.com/@x/shorts?view=0&sort=p&flow=grid");
        assert_eq!(plan[1].index, 1);
    }

    #[test]
    fn test_shorts_url_never_double_suffixed() {
        let base = crate::utils::normalize_channel_url("https://www.youtube.com/@x/shorts").unwrap();
        let plan = listing_plan(&base, TraversalMode::Shorts);
        assert_eq!(plan[0].url, "https://www.youtube.com/@x/shorts?view=0&sort=p&flow=grid");
    }

    #[test]
    fn test_classify_short() {
        assert_eq!(classify_short(Some("https://www.youtube.com/shorts/abc"), None), Some(true));
        assert_eq!(classify_short(None, Some(45)), Some(true));
        assert_eq!(classify_short(None, Some(60)), Some(true));
        assert_eq!(classify_short(Some("https://www.youtube.com/watch?v=a"), Some(61)), Some(false));
        assert_eq!(classify_short(None, None), None);
    }

    #[test]
    fn test_shorts_filter_keeps_unknown() {
        assert!(ShortsFilter::ExcludeShorts.admits(None));
        assert!(!ShortsFilter::ExcludeShorts.admits(Some(true)));
        assert!(!ShortsFilter::OnlyShorts.admits(Some(false)));
        assert!(ShortsFilter::Any.admits(Some(true)));
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(TraversalMode::from_str("LONGFORM"), Some(TraversalMode::Longform));
        assert_eq!(TraversalMode::from_str("videos"), Some(TraversalMode::Longform));
        assert_eq!(TraversalMode::Both.as_str(), "both");
        assert!(!TraversalMode::Recent.is_popularity_sorted());
    }

    #[tokio::test]
    async fn test_from_refs_yields_in_order_then_ends() {
        let refs = vec![VideoRef::new("a", 0), VideoRef::new("b", 1)];
        let mut stream = VideoRefStream::from_refs(listing_plan(BASE, TraversalMode::Popular), refs);
        assert_eq!(stream.next().await.unwrap().unwrap().video_id, "a");
        assert_eq!(stream.next().await.unwrap().unwrap().video_id, "b");
        assert!(stream.next().await.is_none());
    }
}
