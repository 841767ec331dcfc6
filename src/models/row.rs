//! Flattened output rows.

use serde::Serialize;

use super::transcript::TranscriptResult;
use super::video::{Provenance, SourcedMetadata, ThumbnailTier};

/// Output columns, in order.
///
/// The first twenty are the documented set. New columns are only ever
/// appended; existing names never change.
pub const COLUMNS: &[&str] = &[
    "video_id",
    "title",
    "url",
    "views",
    "published_at",
    "duration",
    "channel_id",
    "channel_title",
    "tags",
    "categories",
    "default_language",
    "default_audio_language",
    "thumbnail_default",
    "thumbnail_medium",
    "thumbnail_high",
    "thumbnail_standard",
    "thumbnail_maxres",
    "transcript",
    "transcript_error",
    "source_strategy",
    "rank",
    "like_count",
    "comment_count",
    "metadata_source",
    "transcript_language",
    "transcript_attempts",
];

/// Number of columns in the documented base set.
pub const BASE_COLUMN_COUNT: usize = 20;

const LIST_SEPARATOR: &str = "|";

/// One video in the pipeline's terminal artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeRow {
    pub rank: usize,
    pub provenance: Provenance,
    pub metadata: crate::models::VideoMetadata,
    pub transcript: TranscriptResult,
}

impl ScrapeRow {
    /// Assemble a row once both upstream results exist. Rank is assigned later.
    pub fn assemble(metadata: SourcedMetadata, transcript: TranscriptResult) -> Self {
        let provenance = metadata.provenance();
        Self {
            rank: 0,
            provenance,
            metadata: metadata.into_metadata(),
            transcript,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.metadata.video_id
    }

    pub fn view_count(&self) -> Option<u64> {
        self.metadata.view_count
    }

    /// Render the row as cells aligned with [`COLUMNS`]. Unknown values are
    /// empty strings.
    pub fn to_record(&self) -> Vec<String> {
        let m = &self.metadata;
        let t = &self.transcript;
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let num = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_default();
        let thumb = |tier| m.thumbnail(tier).unwrap_or_default().to_string();

        vec![
            m.video_id.clone(),
            m.title.clone(),
            m.url.clone(),
            num(m.view_count),
            m.published_at.map(|d| d.to_rfc3339()).unwrap_or_default(),
            num(m.duration_secs),
            opt(&m.channel_id),
            opt(&m.channel_title),
            m.tags.join(LIST_SEPARATOR),
            m.categories.join(LIST_SEPARATOR),
            opt(&m.default_language),
            opt(&m.default_audio_language),
            thumb(ThumbnailTier::Default),
            thumb(ThumbnailTier::Medium),
            thumb(ThumbnailTier::High),
            thumb(ThumbnailTier::Standard),
            thumb(ThumbnailTier::Maxres),
            t.text.clone(),
            t.error.map(|e| e.as_str().to_string()).unwrap_or_default(),
            t.source_strategy
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.rank.to_string(),
            num(m.like_count),
            num(m.comment_count),
            self.provenance.as_str().to_string(),
            opt(&t.language),
            t.attempts_summary(),
        ]
    }
}

/// Sort rows by view count descending (unknown last) and assign 1-based ranks.
///
/// The sort is stable, so ties keep enumeration order.
pub fn rank_rows(rows: &mut [ScrapeRow]) {
    rows.sort_by(|a, b| match (a.view_count(), b.view_count()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = idx + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TranscriptErrorKind, VideoMetadata};

    fn row(id: &str, views: Option<u64>) -> ScrapeRow {
        let mut metadata = VideoMetadata::new(id);
        metadata.view_count = views;
        ScrapeRow::assemble(
            SourcedMetadata::Authoritative(metadata),
            TranscriptResult::failure(id, TranscriptErrorKind::Disabled, Vec::new()),
        )
    }

    #[test]
    fn test_record_width_matches_columns() {
        assert_eq!(row("a", Some(1)).to_record().len(), COLUMNS.len());
        assert_eq!(COLUMNS[BASE_COLUMN_COUNT - 1], "source_strategy");
    }

    #[test]
    fn test_rank_rows_descending_nulls_last() {
        let mut rows = vec![
            row("a", Some(10)),
            row("b", None),
            row("c", Some(30)),
            row("d", Some(20)),
        ];
        rank_rows(&mut rows);
        let order: Vec<_> = rows.iter().map(|r| r.video_id().to_string()).collect();
        assert_eq!(order, vec!["c", "d", "a", "b"]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[3].rank, 4);
    }

    #[test]
    fn test_missing_fields_render_as_empty_cells() {
        let record = row("a", None).to_record();
        let idx = |name: &str| COLUMNS.iter().position(|c| *c == name).unwrap();
        assert_eq!(record[idx("views")], "");
        assert_eq!(record[idx("thumbnail_maxres")], "");
        assert_eq!(record[idx("transcript_error")], "disabled");
        assert_eq!(record[idx("source_strategy")], "none");
    }
}
