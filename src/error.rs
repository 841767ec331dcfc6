//! Error types for the scrape pipeline.
//!
//! Per-video failures (`MetadataError::Unavailable`, transcript failures) are
//! recorded and the run continues. Only channel-level and credential-level
//! failures surface as [`PipelineError`].

use thiserror::Error;

use crate::http_client::FetchError;

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("channel reference {reference:?} cannot be resolved: {reason}")]
    Unresolvable { reference: String, reason: String },
    #[error("yt-dlp is not available: {0}")]
    ToolMissing(String),
    #[error("enumeration request failed: {0}")]
    Transport(#[from] FetchError),
    #[error("unexpected listing response: {0}")]
    Layout(String),
    #[error("API quota exceeded during enumeration: {0}")]
    QuotaExceeded(String),
}

impl EnumerationError {
    pub fn unresolvable(reference: &str, reason: impl Into<String>) -> Self {
        Self::Unresolvable {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// Per-video: the backend has no usable record for this ID.
    #[error("metadata unavailable for {video_id}: {reason}")]
    Unavailable { video_id: String, reason: String },
    /// Batch-level and fatal for the authoritative backend.
    #[error("API quota exceeded: {0}")]
    QuotaExceeded(String),
    /// Batch-level transport or decoding failure.
    #[error("metadata request failed: {0}")]
    Transport(String),
}

impl MetadataError {
    pub fn unavailable(video_id: &str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            video_id: video_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

impl From<FetchError> for MetadataError {
    fn from(err: FetchError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Fatal run errors. Any of these moves the pipeline to `Aborted`.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("enumeration failed: {0}")]
    Enumeration(String),
    #[error("API quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("metadata backend failed: {0}")]
    Metadata(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<EnumerationError> for PipelineError {
    fn from(err: EnumerationError) -> Self {
        match err {
            EnumerationError::QuotaExceeded(detail) => Self::QuotaExceeded(detail),
            other => Self::Enumeration(other.to_string()),
        }
    }
}

impl From<MetadataError> for PipelineError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::QuotaExceeded(detail) => Self::QuotaExceeded(detail),
            other => Self::Metadata(other.to_string()),
        }
    }
}

impl PipelineError {
    /// Short machine-readable label, used in reports and CSV-adjacent output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Enumeration(_) => "enumeration_error",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::Metadata(_) => "metadata_error",
            Self::Configuration(_) => "configuration_error",
        }
    }
}
