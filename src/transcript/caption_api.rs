//! Captions through the structured transcript service in `yt_transcript_rs`.
//!
//! The service lists a video's caption tracks and fetches the preferred one.
//! Its error reasons change between releases, so they are translated onto
//! the fixed taxonomy by [`classify`] at this boundary and never leak past
//! the strategy.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use yt_transcript_rs::errors::{CouldNotRetrieveTranscript, CouldNotRetrieveTranscriptReason};
use yt_transcript_rs::YouTubeTranscriptApi;

use super::{TranscriptPreferences, TranscriptStrategy};
use crate::models::{StrategyKind, TranscriptErrorKind, TranscriptFailure, TranscriptText};
use crate::utils::text::{html_unescape, join_caption_lines};

/// A transcript as returned by a caption service, before cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTranscript {
    pub lines: Vec<String>,
    pub language_code: String,
    pub generated: bool,
}

/// Source of structured caption listings.
#[async_trait]
pub trait CaptionService: Send + Sync {
    async fn transcript(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<ServiceTranscript, TranscriptFailure>;
}

/// Translate a `yt_transcript_rs` failure reason into the fixed taxonomy.
pub fn classify(reason: Option<&CouldNotRetrieveTranscriptReason>) -> TranscriptErrorKind {
    use CouldNotRetrieveTranscriptReason as R;
    match reason {
        None => TranscriptErrorKind::UnsupportedLayout,
        Some(R::TranscriptsDisabled { .. }) => TranscriptErrorKind::Disabled,
        Some(R::NoTranscriptFound { .. })
        | Some(R::TranslationUnavailable { .. })
        | Some(R::TranslationLanguageUnavailable { .. }) => TranscriptErrorKind::NotFound,
        Some(R::VideoUnavailable { .. })
        | Some(R::InvalidVideoId { .. })
        | Some(R::AgeRestricted { .. }) => TranscriptErrorKind::Unavailable,
        Some(R::VideoUnplayable { .. }) => TranscriptErrorKind::Unavailable,
        Some(R::IpBlocked { .. }) | Some(R::RequestBlocked { .. }) => {
            TranscriptErrorKind::RateLimited
        }
        Some(R::YouTubeRequestFailed { .. }) => TranscriptErrorKind::Network,
        Some(R::FailedToCreateConsentCookie { .. }) | Some(R::YouTubeDataUnparsable { .. }) => {
            TranscriptErrorKind::UnsupportedLayout
        }
        #[allow(unreachable_patterns)]
        Some(_) => TranscriptErrorKind::UnsupportedLayout,
    }
}

fn to_failure(err: &CouldNotRetrieveTranscript) -> TranscriptFailure {
    TranscriptFailure::new(classify(err.reason.as_ref()), err.to_string())
}

/// [`CaptionService`] backed by `yt_transcript_rs::YouTubeTranscriptApi`.
pub struct YtTranscriptService {
    api: YouTubeTranscriptApi,
}

impl YtTranscriptService {
    pub fn new() -> Result<Self, String> {
        let api = YouTubeTranscriptApi::new(None, None, None).map_err(|e| e.to_string())?;
        Ok(Self { api })
    }
}

#[async_trait]
impl CaptionService for YtTranscriptService {
    async fn transcript(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<ServiceTranscript, TranscriptFailure> {
        let languages: Vec<&str> = languages.iter().map(String::as_str).collect();
        let fetched = self
            .api
            .fetch_transcript(video_id, &languages, false)
            .await
            .map_err(|e| to_failure(&e))?;

        Ok(ServiceTranscript {
            lines: fetched.parts().iter().map(|p| p.text.clone()).collect(),
            language_code: fetched.language_code.clone(),
            generated: fetched.is_generated,
        })
    }
}

pub struct CaptionApiStrategy {
    service: Arc<dyn CaptionService>,
}

impl CaptionApiStrategy {
    pub fn new(service: Arc<dyn CaptionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TranscriptStrategy for CaptionApiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CaptionApi
    }

    async fn fetch(
        &self,
        video_id: &str,
        prefs: &TranscriptPreferences,
    ) -> Result<TranscriptText, TranscriptFailure> {
        let transcript = self.service.transcript(video_id, &prefs.languages).await?;
        if transcript.generated && !prefs.allow_generated {
            return Err(TranscriptFailure::new(
                TranscriptErrorKind::NotFound,
                format!("only a generated {} track is listed", transcript.language_code),
            ));
        }

        let text = join_caption_lines(transcript.lines.iter().map(|line| html_unescape(line)));
        if text.is_empty() {
            return Err(TranscriptFailure::new(TranscriptErrorKind::Empty, "caption payload is empty"));
        }
        debug!(
            "Caption service returned {} lines of {} for {}",
            transcript.lines.len(),
            transcript.language_code,
            video_id
        );
        Ok(TranscriptText {
            text,
            language: Some(transcript.language_code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const ID: &str = "abcdefghijk";

    struct FixedService {
        answer: Result<ServiceTranscript, TranscriptErrorKind>,
        requested: Mutex<Vec<Vec<String>>>,
    }

    impl FixedService {
        fn new(answer: Result<ServiceTranscript, TranscriptErrorKind>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CaptionService for FixedService {
        async fn transcript(
            &self,
            _video_id: &str,
            languages: &[String],
        ) -> Result<ServiceTranscript, TranscriptFailure> {
            self.requested.lock().unwrap().push(languages.to_vec());
            self.answer
                .clone()
                .map_err(|kind| TranscriptFailure::new(kind, "fixed"))
        }
    }

    fn transcript(lines: &[&str], generated: bool) -> ServiceTranscript {
        ServiceTranscript {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            language_code: "en".to_string(),
            generated,
        }
    }

    #[tokio::test]
    async fn test_lines_are_cleaned_and_joined() {
        let service = FixedService::new(Ok(transcript(&["it&#39;s", "it&#39;s", " a  test "], false)));
        let prefs = TranscriptPreferences {
            languages: vec!["en".into(), "de".into()],
            allow_generated: true,
        };
        let text = CaptionApiStrategy::new(service.clone()).fetch(ID, &prefs).await.unwrap();
        assert_eq!(text.text, "it's a test");
        assert_eq!(text.language.as_deref(), Some("en"));
        assert_eq!(*service.requested.lock().unwrap(), vec![vec!["en".to_string(), "de".to_string()]]);
    }

    #[tokio::test]
    async fn test_generated_track_respects_preference() {
        let service = FixedService::new(Ok(transcript(&["auto"], true)));
        let prefs = TranscriptPreferences {
            languages: vec!["en".into()],
            allow_generated: false,
        };
        let err = CaptionApiStrategy::new(service).fetch(ID, &prefs).await.unwrap_err();
        assert_eq!(err.kind, TranscriptErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_blank_lines_are_empty() {
        let service = FixedService::new(Ok(transcript(&["", "  "], false)));
        let err = CaptionApiStrategy::new(service)
            .fetch(ID, &TranscriptPreferences::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TranscriptErrorKind::Empty);
    }

    #[tokio::test]
    async fn test_service_failure_passes_through() {
        let service = FixedService::new(Err(TranscriptErrorKind::Disabled));
        let err = CaptionApiStrategy::new(service)
            .fetch(ID, &TranscriptPreferences::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TranscriptErrorKind::Disabled);
    }

    #[test]
    fn test_classify_library_reasons() {
        use CouldNotRetrieveTranscriptReason as R;
        let cases = [
            (R::TranscriptsDisabled, TranscriptErrorKind::Disabled),
            (R::VideoUnavailable, TranscriptErrorKind::Unavailable),
            (R::InvalidVideoId, TranscriptErrorKind::Unavailable),
            (R::AgeRestricted, TranscriptErrorKind::Unavailable),
            (
                R::YouTubeRequestFailed("connection reset".into()),
                TranscriptErrorKind::Network,
            ),
            (
                R::YouTubeDataUnparsable("no player response".into()),
                TranscriptErrorKind::UnsupportedLayout,
            ),
            (R::FailedToCreateConsentCookie, TranscriptErrorKind::UnsupportedLayout),
        ];
        for (reason, expected) in cases {
            assert_eq!(classify(Some(&reason)), expected);
        }
        assert_eq!(classify(None), TranscriptErrorKind::UnsupportedLayout);
    }
}
