//! Progress events emitted by the scrape pipeline.

use crate::enumerate::TraversalMode;
use crate::models::{StrategyKind, TranscriptErrorKind};
use crate::ranking::{StopReason, Verdict};

/// Events emitted while a run progresses. Consumers are UI only; dropping
/// the receiver never affects the run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        base: String,
        mode: TraversalMode,
    },
    ListingResolved {
        index: usize,
        url: String,
    },
    /// A metadata record was fed to the filter.
    Scanned {
        video_id: String,
        views: Option<u64>,
        verdict: Verdict,
        scanned: usize,
    },
    Kept {
        video_id: String,
        title: String,
        views: Option<u64>,
        kept: usize,
    },
    Stopped {
        reason: StopReason,
    },
    TranscriptStarted {
        video_id: String,
        total: usize,
    },
    TranscriptFinished {
        video_id: String,
        error: Option<TranscriptErrorKind>,
        strategy: Option<StrategyKind>,
    },
    Finished {
        rows: usize,
        aborted: bool,
    },
}
