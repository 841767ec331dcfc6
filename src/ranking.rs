//! View-count threshold filter with an early-stop heuristic.
//!
//! Records are observed in enumeration order. A record is kept when its view
//! count is known and at least the threshold. On a popularity-sorted listing,
//! a run of consecutive trusted below-threshold records suggests the rest of
//! the listing is below threshold too, so the listing is abandoned.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::enumerate::Listing;
use crate::metadata::VideoOutcome;
use crate::models::VideoRef;

/// Why scanning ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The enumeration stream ran out.
    ThresholdExhaustedStream,
    /// Every listing hit its below-threshold streak.
    EarlyStopTriggered,
    ScanLimitReached,
    ResultLimitReached,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThresholdExhaustedStream => "threshold_exhausted_stream",
            Self::EarlyStopTriggered => "early_stop_triggered",
            Self::ScanLimitReached => "scan_limit_reached",
            Self::ResultLimitReached => "result_limit_reached",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the filter did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Kept,
    BelowThreshold,
    /// View count unknown; never kept.
    UnknownViews,
    MetadataUnavailable,
}

#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub min_views: u64,
    /// Consecutive trusted below-threshold records before a listing is
    /// abandoned. `0` disables early stopping.
    pub streak_limit: usize,
    /// Upper bound on records observed across all listings.
    pub scan_limit: usize,
    pub max_results: Option<usize>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_views: 300_000,
            streak_limit: 8,
            scan_limit: 600,
            max_results: Some(150),
        }
    }
}

#[derive(Debug, Clone)]
struct ListingState {
    early_stop: bool,
    streak: usize,
    exhausted: bool,
}

#[derive(Debug)]
pub struct RankingFilter {
    config: RankingConfig,
    listings: Vec<ListingState>,
    scanned: usize,
    kept: usize,
    unavailable: usize,
}

impl RankingFilter {
    pub fn new(config: RankingConfig, listings: &[Listing]) -> Self {
        let wants_early_stop = config.streak_limit > 0;
        if wants_early_stop && listings.iter().any(|l| !l.popularity_sorted) {
            warn!(
                "Early stop requested but the listing is not sorted by popularity; \
                 scanning up to the scan limit instead"
            );
        }
        let states = listings
            .iter()
            .map(|l| ListingState {
                early_stop: wants_early_stop && l.popularity_sorted,
                streak: 0,
                exhausted: false,
            })
            .collect();
        Self {
            config,
            listings: states,
            scanned: 0,
            kept: 0,
            unavailable: 0,
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn scanned(&self) -> usize {
        self.scanned
    }

    pub fn kept(&self) -> usize {
        self.kept
    }

    pub fn unavailable(&self) -> usize {
        self.unavailable
    }

    /// Current streak for a listing.
    pub fn streak(&self, listing: usize) -> usize {
        self.listings.get(listing).map(|s| s.streak).unwrap_or(0)
    }

    /// Whether refs from this listing should be dropped without a fetch.
    pub fn is_exhausted(&self, listing: usize) -> bool {
        self.listings.get(listing).is_some_and(|s| s.exhausted)
    }

    /// Feed one metadata outcome, in enumeration order.
    pub fn observe(&mut self, video: &VideoRef, outcome: &VideoOutcome) -> Verdict {
        self.scanned += 1;
        let min_views = self.config.min_views;
        let streak_limit = self.config.streak_limit;

        let sourced = match outcome {
            Ok(sourced) => sourced,
            Err(err) => {
                self.unavailable += 1;
                debug!("{}: {}", video.video_id, err);
                return Verdict::MetadataUnavailable;
            }
        };

        let verdict = match sourced.view_count() {
            None => Verdict::UnknownViews,
            Some(views) if views >= min_views => Verdict::Kept,
            Some(_) => Verdict::BelowThreshold,
        };

        if verdict == Verdict::Kept {
            self.kept += 1;
        }

        let trusted = sourced.views_trusted();
        if let Some(state) = self.listings.get_mut(video.listing) {
            match verdict {
                Verdict::Kept => state.streak = 0,
                Verdict::BelowThreshold if trusted && state.early_stop => {
                    state.streak += 1;
                    if state.streak >= streak_limit && !state.exhausted {
                        state.exhausted = true;
                        info!(
                            "Listing {} ended after {} consecutive videos below {} views",
                            video.listing, state.streak, min_views
                        );
                    }
                }
                _ => {}
            }
        }
        verdict
    }

    /// Reason to stop scanning now, if any.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.config.max_results.is_some_and(|max| self.kept >= max) {
            return Some(StopReason::ResultLimitReached);
        }
        if self.all_listings_exhausted() {
            return Some(StopReason::EarlyStopTriggered);
        }
        if self.scanned >= self.config.scan_limit {
            return Some(StopReason::ScanLimitReached);
        }
        None
    }

    /// Reason to report when the enumeration stream ended on its own.
    pub fn finish(&self) -> StopReason {
        self.stop_reason()
            .unwrap_or(StopReason::ThresholdExhaustedStream)
    }

    fn all_listings_exhausted(&self) -> bool {
        !self.listings.is_empty() && self.listings.iter().all(|s| s.exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::{listing_plan, TraversalMode};
    use crate::error::MetadataError;
    use crate::models::{SourcedMetadata, VideoMetadata, ViewCountQuality};

    const BASE: &str = "https://www.youtube.com/@x";

    fn authoritative(id: &str, views: Option<u64>) -> VideoOutcome {
        let mut metadata = VideoMetadata::new(id);
        metadata.view_count = views;
        Ok(SourcedMetadata::Authoritative(metadata))
    }

    fn approximate(id: &str, views: u64) -> VideoOutcome {
        let mut metadata = VideoMetadata::new(id);
        metadata.view_count = Some(views);
        Ok(SourcedMetadata::BestEffort {
            metadata,
            views: ViewCountQuality::Approximate,
        })
    }

    fn config(min_views: u64, streak_limit: usize) -> RankingConfig {
        RankingConfig {
            min_views,
            streak_limit,
            scan_limit: 600,
            max_results: None,
        }
    }

    fn filter(cfg: RankingConfig, mode: TraversalMode) -> RankingFilter {
        RankingFilter::new(cfg, &listing_plan(BASE, mode))
    }

    /// Observe views in order until the filter asks to stop.
    fn run(filter: &mut RankingFilter, views: &[u64]) -> Vec<usize> {
        let mut kept = Vec::new();
        for (i, v) in views.iter().enumerate() {
            let video = VideoRef::new(format!("v{}", i), i);
            if filter.observe(&video, &authoritative(&video.video_id, Some(*v))) == Verdict::Kept {
                kept.push(i);
            }
            if filter.stop_reason().is_some() {
                break;
            }
        }
        kept
    }

    #[test]
    fn test_popular_mode_early_stop() {
        let views = [
            500_000, 450_000, 10_000, 9_000, 8_000, 7_000, 6_000, 5_000, 4_000, 3_000, 2_000,
            1_000,
        ];
        let mut f = filter(config(300_000, 5), TraversalMode::Popular);
        assert_eq!(run(&mut f, &views), vec![0, 1]);
        assert_eq!(f.stop_reason(), Some(StopReason::EarlyStopTriggered));
        assert_eq!(f.scanned(), 7);
    }

    #[test]
    fn test_kept_video_resets_streak() {
        let mut f = filter(config(100, 3), TraversalMode::Popular);
        let kept = run(&mut f, &[1, 2, 500, 3, 4, 600, 5, 6]);
        assert_eq!(kept, vec![2, 5]);
        assert_eq!(f.stop_reason(), None);
        assert_eq!(f.streak(0), 2);
        assert_eq!(f.finish(), StopReason::ThresholdExhaustedStream);
    }

    #[test]
    fn test_unknown_views_never_kept_and_streak_neutral() {
        let mut f = filter(config(0, 2), TraversalMode::Popular);
        let video = VideoRef::new("a", 0);
        assert_eq!(f.observe(&video, &authoritative("a", None)), Verdict::UnknownViews);
        assert_eq!(f.kept(), 0);
        assert_eq!(f.streak(0), 0);
    }

    #[test]
    fn test_unavailable_counts_toward_scan_limit_only() {
        let mut cfg = config(100, 1);
        cfg.scan_limit = 2;
        let mut f = filter(cfg, TraversalMode::Popular);
        let missing: VideoOutcome = Err(MetadataError::unavailable("a", "private"));
        assert_eq!(f.observe(&VideoRef::new("a", 0), &missing), Verdict::MetadataUnavailable);
        assert_eq!(f.streak(0), 0);
        assert_eq!(f.stop_reason(), None);
        f.observe(&VideoRef::new("b", 1), &missing);
        assert_eq!(f.stop_reason(), Some(StopReason::ScanLimitReached));
        assert_eq!(f.unavailable(), 2);
    }

    #[test]
    fn test_approximate_counts_do_not_advance_streak() {
        let mut f = filter(config(1_000_000, 1), TraversalMode::Popular);
        let verdict = f.observe(&VideoRef::new("a", 0), &approximate("a", 1_200));
        assert_eq!(verdict, Verdict::BelowThreshold);
        assert_eq!(f.streak(0), 0);
        assert_eq!(f.stop_reason(), None);
    }

    #[test]
    fn test_approximate_count_above_threshold_is_kept() {
        let mut f = filter(config(1_000_000, 1), TraversalMode::Popular);
        let verdict = f.observe(&VideoRef::new("a", 0), &approximate("a", 1_200_000));
        assert_eq!(verdict, Verdict::Kept);
    }

    #[test]
    fn test_recent_mode_never_early_stops() {
        let mut f = filter(config(1_000, 2), TraversalMode::Recent);
        run(&mut f, &[1, 2, 3, 4, 5]);
        assert_eq!(f.stop_reason(), None);
        assert_eq!(f.finish(), StopReason::ThresholdExhaustedStream);
    }

    #[test]
    fn test_zero_streak_disables_early_stop() {
        let mut f = filter(config(1_000, 0), TraversalMode::Popular);
        run(&mut f, &[1; 20]);
        assert_eq!(f.finish(), StopReason::ThresholdExhaustedStream);
    }

    #[test]
    fn test_both_mode_streak_is_per_listing() {
        let mut f = filter(config(1_000, 2), TraversalMode::Both);
        let longform = |i: usize| VideoRef::new(format!("l{}", i), i).with_listing(0, "l");
        let shorts = |i: usize| VideoRef::new(format!("s{}", i), i).with_listing(1, "s");

        f.observe(&longform(0), &authoritative("l0", Some(1)));
        f.observe(&longform(1), &authoritative("l1", Some(1)));
        assert!(f.is_exhausted(0));
        assert!(!f.is_exhausted(1));
        assert_eq!(f.stop_reason(), None);

        f.observe(&shorts(2), &authoritative("s2", Some(5_000)));
        f.observe(&shorts(3), &authoritative("s3", Some(1)));
        assert_eq!(f.stop_reason(), None);
        f.observe(&shorts(4), &authoritative("s4", Some(1)));
        assert_eq!(f.stop_reason(), Some(StopReason::EarlyStopTriggered));
        assert_eq!(f.kept(), 1);
    }

    #[test]
    fn test_result_limit() {
        let mut cfg = config(10, 0);
        cfg.max_results = Some(2);
        let mut f = filter(cfg, TraversalMode::Popular);
        assert_eq!(run(&mut f, &[50, 60, 70]), vec![0, 1]);
        assert_eq!(f.stop_reason(), Some(StopReason::ResultLimitReached));
    }
}
