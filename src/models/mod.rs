//! Data models for tubesift.

mod row;
mod transcript;
mod video;

pub use row::{rank_rows, ScrapeRow, BASE_COLUMN_COUNT, COLUMNS};
pub use transcript::{
    StrategyAttempt, StrategyKind, TranscriptErrorKind, TranscriptFailure, TranscriptResult,
    TranscriptText,
};
pub use video::{
    watch_url, Provenance, SourcedMetadata, ThumbnailTier, VideoMetadata, VideoRef,
    ViewCountQuality,
};
