//! Transcript results and the fixed failure taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classified reason a transcript strategy (or the whole chain) failed.
///
/// This set is closed. Upstream error shapes are translated into it at each
/// strategy boundary and never leak past the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptErrorKind {
    /// Captions are turned off for the video.
    Disabled,
    /// Captions exist but none matched, or no caption track could be found.
    NotFound,
    /// Upstream throttled or blocked the request.
    RateLimited,
    /// The response had a shape this resolver does not understand.
    UnsupportedLayout,
    /// The video itself is private, removed, or region/age locked.
    Unavailable,
    /// Transport failure before any classifiable response arrived.
    Network,
    /// Captions were fetched but contained no text.
    Empty,
    AudioDownloadFailed,
    AudioTranscriptionFailed,
    /// No strategy ran (all disabled, or the run aborted first).
    NotAttempted,
    Cancelled,
}

impl TranscriptErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::UnsupportedLayout => "unsupported_layout",
            Self::Unavailable => "unavailable",
            Self::Network => "network",
            Self::Empty => "empty",
            Self::AudioDownloadFailed => "audio_download_failed",
            Self::AudioTranscriptionFailed => "audio_transcription_failed",
            Self::NotAttempted => "not_attempted",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "disabled" => Some(Self::Disabled),
            "not_found" => Some(Self::NotFound),
            "rate_limited" => Some(Self::RateLimited),
            "unsupported_layout" => Some(Self::UnsupportedLayout),
            "unavailable" => Some(Self::Unavailable),
            "network" => Some(Self::Network),
            "empty" => Some(Self::Empty),
            "audio_download_failed" => Some(Self::AudioDownloadFailed),
            "audio_transcription_failed" => Some(Self::AudioTranscriptionFailed),
            "not_attempted" => Some(Self::NotAttempted),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TranscriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transcript strategies, in chain priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    CaptionApi,
    WatchPage,
    AuthenticatedSession,
    AudioTranscription,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaptionApi => "caption_api",
            Self::WatchPage => "watch_page",
            Self::AuthenticatedSession => "authenticated_session",
            Self::AudioTranscription => "audio_transcription",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "caption_api" => Some(Self::CaptionApi),
            "watch_page" => Some(Self::WatchPage),
            "authenticated_session" => Some(Self::AuthenticatedSession),
            "audio_transcription" => Some(Self::AudioTranscription),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transcript strategy's failure: the classified kind plus upstream detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct TranscriptFailure {
    pub kind: TranscriptErrorKind,
    pub detail: String,
}

impl TranscriptFailure {
    pub fn new(kind: TranscriptErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Record of one strategy attempt within a resolver chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    /// `None` when the attempt produced text.
    pub error: Option<TranscriptErrorKind>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// Text produced by a successful strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptText {
    pub text: String,
    pub language: Option<String>,
}

/// Outcome of resolving a transcript for one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub video_id: String,
    /// Possibly empty.
    pub text: String,
    /// `None` exactly when `text` is non-empty.
    pub error: Option<TranscriptErrorKind>,
    pub source_strategy: Option<StrategyKind>,
    pub language: Option<String>,
    #[serde(default)]
    pub attempts: Vec<StrategyAttempt>,
}

impl TranscriptResult {
    pub fn success(
        video_id: impl Into<String>,
        strategy: StrategyKind,
        text: TranscriptText,
        attempts: Vec<StrategyAttempt>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            text: text.text,
            error: None,
            source_strategy: Some(strategy),
            language: text.language,
            attempts,
        }
    }

    pub fn failure(
        video_id: impl Into<String>,
        error: TranscriptErrorKind,
        attempts: Vec<StrategyAttempt>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            text: String::new(),
            error: Some(error),
            source_strategy: None,
            language: None,
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Compact attempt log, e.g. `caption_api:disabled;watch_page:ok`.
    pub fn attempts_summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                format!(
                    "{}:{}",
                    a.strategy.as_str(),
                    a.error.map(|e| e.as_str()).unwrap_or("ok")
                )
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}
