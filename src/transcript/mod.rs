//! Transcript resolution through an ordered chain of strategies.
//!
//! Strategies run in [`StrategyKind`] order until one produces non-empty
//! text. Every attempt is recorded; a failing strategy never stops the chain.

mod audio;
mod caption_api;
mod formats;
mod session;
mod tracks;
mod watch_page;

pub use audio::{
    AudioSource, AudioTranscriptionStrategy, OpenAiTranscriber, SpeechToText, YtDlpAudio,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_TRANSCRIPTION_MODEL, MAX_AUDIO_BYTES,
};
pub use caption_api::{
    classify, CaptionApiStrategy, CaptionService, ServiceTranscript, YtTranscriptService,
};
pub use formats::{caption_text, CaptionFormat};
pub use session::AuthenticatedSessionStrategy;
pub use tracks::{parse_caption_tracks, select_track, CaptionTrack};
pub use watch_page::{classify_page_failure, CaptionFailure, Stage, WatchPageStrategy};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::http_client::Fetch;
use crate::models::{
    StrategyAttempt, StrategyKind, TranscriptErrorKind, TranscriptFailure, TranscriptResult,
    TranscriptText,
};

/// Caption language and track preferences shared by every strategy.
#[derive(Debug, Clone)]
pub struct TranscriptPreferences {
    /// Requested languages, most preferred first.
    pub languages: Vec<String>,
    /// Accept auto-generated caption tracks.
    pub allow_generated: bool,
}

impl Default for TranscriptPreferences {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            allow_generated: true,
        }
    }
}

#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn fetch(
        &self,
        video_id: &str,
        prefs: &TranscriptPreferences,
    ) -> Result<TranscriptText, TranscriptFailure>;
}

/// Which strategies a run uses and how they are configured.
#[derive(Debug, Clone)]
pub struct TranscriptSettings {
    pub caption_api: bool,
    pub watch_page: bool,
    pub audio_transcription: bool,
    pub preferences: TranscriptPreferences,
    /// Session cookies; enables the authenticated session strategy.
    pub cookie_file: Option<PathBuf>,
    pub transcription_model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            caption_api: true,
            watch_page: true,
            audio_transcription: false,
            preferences: TranscriptPreferences::default(),
            cookie_file: None,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            openai_api_key: None,
            openai_base_url: None,
        }
    }
}

pub struct TranscriptResolver {
    strategies: Vec<Arc<dyn TranscriptStrategy>>,
    preferences: TranscriptPreferences,
}

impl TranscriptResolver {
    pub fn new(preferences: TranscriptPreferences) -> Self {
        Self {
            strategies: Vec::new(),
            preferences,
        }
    }

    /// Add a strategy. The chain stays sorted by priority regardless of the
    /// order strategies are added in.
    pub fn with_strategy(mut self, strategy: Arc<dyn TranscriptStrategy>) -> Self {
        self.strategies.push(strategy);
        self.strategies.sort_by_key(|s| s.kind());
        self
    }

    /// Build the chain from settings, with the caption service backed by
    /// `yt_transcript_rs`.
    ///
    /// `session` is the cookie-carrying client; the authenticated strategy
    /// is only added when it is present.
    pub fn standard(
        settings: &TranscriptSettings,
        anonymous: Arc<dyn Fetch>,
        session: Option<Arc<dyn Fetch>>,
    ) -> Result<Self, PipelineError> {
        let captions: Option<Arc<dyn CaptionService>> = if settings.caption_api {
            let service = YtTranscriptService::new().map_err(|e| {
                PipelineError::Configuration(format!("caption service unavailable: {}", e))
            })?;
            Some(Arc::new(service))
        } else {
            None
        };
        Self::standard_with_captions(settings, captions, anonymous, session)
    }

    /// Build the chain from settings around a given caption service.
    pub fn standard_with_captions(
        settings: &TranscriptSettings,
        captions: Option<Arc<dyn CaptionService>>,
        anonymous: Arc<dyn Fetch>,
        session: Option<Arc<dyn Fetch>>,
    ) -> Result<Self, PipelineError> {
        let mut resolver = Self::new(settings.preferences.clone());

        if let Some(captions) = captions.filter(|_| settings.caption_api) {
            resolver = resolver.with_strategy(Arc::new(CaptionApiStrategy::new(captions)));
        }
        if settings.watch_page {
            resolver = resolver.with_strategy(Arc::new(WatchPageStrategy::new(anonymous)));
        }
        if let Some(session) = session.filter(|_| settings.caption_api || settings.watch_page) {
            resolver = resolver.with_strategy(Arc::new(AuthenticatedSessionStrategy::new(session)));
        }
        if settings.audio_transcription {
            let api_key = settings.openai_api_key.clone().ok_or_else(|| {
                PipelineError::Configuration(
                    "audio transcription needs OPENAI_API_KEY or openai_api_key".to_string(),
                )
            })?;
            let binary = which::which("yt-dlp").map_err(|e| {
                PipelineError::Configuration(format!("audio transcription needs yt-dlp: {}", e))
            })?;
            let mut source = YtDlpAudio::new(binary);
            if let Some(cookies) = &settings.cookie_file {
                source = source.with_extra_args(vec![
                    "--cookies".to_string(),
                    cookies.to_string_lossy().to_string(),
                ]);
            }
            let mut speech = OpenAiTranscriber::new(api_key, settings.transcription_model.clone())
                .map_err(|e| PipelineError::Configuration(e.to_string()))?;
            if let Some(base) = &settings.openai_base_url {
                speech = speech.with_base_url(base.clone());
            }
            resolver = resolver.with_strategy(Arc::new(AudioTranscriptionStrategy::new(
                Arc::new(source),
                Arc::new(speech),
            )));
        }

        info!(
            "Transcript strategies: {}",
            if resolver.strategies.is_empty() {
                "none".to_string()
            } else {
                resolver
                    .strategy_kinds()
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            }
        );
        Ok(resolver)
    }

    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Resolve a transcript for one video.
    pub async fn resolve(&self, video_id: &str) -> TranscriptResult {
        if self.strategies.is_empty() {
            return TranscriptResult::failure(video_id, TranscriptErrorKind::NotAttempted, Vec::new());
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut last_error = TranscriptErrorKind::NotAttempted;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            match strategy.fetch(video_id, &self.preferences).await {
                Ok(text) if !text.text.trim().is_empty() => {
                    attempts.push(StrategyAttempt {
                        strategy: kind,
                        error: None,
                        detail: String::new(),
                    });
                    debug!("{}: transcript from {}", video_id, kind);
                    return TranscriptResult::success(video_id, kind, text, attempts);
                }
                Ok(_) => {
                    last_error = TranscriptErrorKind::Empty;
                    attempts.push(StrategyAttempt {
                        strategy: kind,
                        error: Some(TranscriptErrorKind::Empty),
                        detail: "no text".to_string(),
                    });
                }
                Err(failure) => {
                    debug!("{}: {} failed: {}", video_id, kind, failure);
                    last_error = failure.kind;
                    attempts.push(StrategyAttempt {
                        strategy: kind,
                        error: Some(failure.kind),
                        detail: failure.detail,
                    });
                }
            }
        }

        TranscriptResult::failure(video_id, last_error, attempts)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Scripted;
    use super::*;
    use crate::http_client::CannedFetch;

    #[tokio::test]
    async fn test_strategies_run_in_priority_order() {
        let audio = Scripted::ok(StrategyKind::AudioTranscription, "from audio");
        let api = Scripted::failing(StrategyKind::CaptionApi, TranscriptErrorKind::RateLimited);
        let page = Scripted::failing(StrategyKind::WatchPage, TranscriptErrorKind::NotFound);
        let resolver = TranscriptResolver::new(TranscriptPreferences::default())
            .with_strategy(audio.clone())
            .with_strategy(page.clone())
            .with_strategy(api.clone());

        assert_eq!(
            resolver.strategy_kinds(),
            vec![
                StrategyKind::CaptionApi,
                StrategyKind::WatchPage,
                StrategyKind::AudioTranscription
            ]
        );
        let result = resolver.resolve("abcdefghijk").await;
        assert!(result.is_success());
        assert_eq!(result.source_strategy, Some(StrategyKind::AudioTranscription));
        assert_eq!(
            result.attempts_summary(),
            "caption_api:rate_limited;watch_page:not_found;audio_transcription:ok"
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let api = Scripted::ok(StrategyKind::CaptionApi, "hello");
        let page = Scripted::ok(StrategyKind::WatchPage, "unused");
        let resolver = TranscriptResolver::new(TranscriptPreferences::default())
            .with_strategy(api)
            .with_strategy(page.clone());
        let result = resolver.resolve("abcdefghijk").await;
        assert_eq!(result.text, "hello");
        assert!(page.calls().is_empty());
    }

    #[tokio::test]
    async fn test_last_error_wins_and_empty_text_is_failure() {
        let api = Scripted::ok(StrategyKind::CaptionApi, "   ");
        let page = Scripted::failing(StrategyKind::WatchPage, TranscriptErrorKind::Disabled);
        let resolver = TranscriptResolver::new(TranscriptPreferences::default())
            .with_strategy(api)
            .with_strategy(page);
        let result = resolver.resolve("abcdefghijk").await;
        assert_eq!(result.error, Some(TranscriptErrorKind::Disabled));
        assert_eq!(result.text, "");
        assert_eq!(result.source_strategy, None);
        assert_eq!(result.attempts[0].error, Some(TranscriptErrorKind::Empty));
    }

    #[tokio::test]
    async fn test_no_strategies_is_not_attempted() {
        let settings = TranscriptSettings {
            caption_api: false,
            watch_page: false,
            ..Default::default()
        };
        let fetch: Arc<dyn Fetch> = Arc::new(CannedFetch::new());
        let resolver = TranscriptResolver::standard(&settings, fetch.clone(), Some(fetch)).unwrap();
        assert!(resolver.strategy_kinds().is_empty());
        let result = resolver.resolve("abcdefghijk").await;
        assert_eq!(result.error, Some(TranscriptErrorKind::NotAttempted));
        assert!(result.attempts.is_empty());
    }

    #[test]
    fn test_standard_chain_with_session() {
        let fetch: Arc<dyn Fetch> = Arc::new(CannedFetch::new());
        let resolver =
            TranscriptResolver::standard(&TranscriptSettings::default(), fetch.clone(), Some(fetch))
                .unwrap();
        assert_eq!(
            resolver.strategy_kinds(),
            vec![
                StrategyKind::CaptionApi,
                StrategyKind::WatchPage,
                StrategyKind::AuthenticatedSession
            ]
        );
    }

    /// Caption service that reports captions as turned off.
    struct NoCaptions;

    #[async_trait]
    impl CaptionService for NoCaptions {
        async fn transcript(
            &self,
            _video_id: &str,
            _languages: &[String],
        ) -> Result<ServiceTranscript, TranscriptFailure> {
            Err(TranscriptFailure::new(TranscriptErrorKind::Disabled, "transcripts disabled"))
        }
    }

    #[tokio::test]
    async fn test_caption_less_video_loads_each_page_once() {
        let page = crate::watch_page::fixtures::watch_html(
            &serde_json::json!({"playabilityStatus": {"status": "OK"}}),
            None,
        );
        let anonymous = Arc::new(CannedFetch::new().route("/watch?v=", 200, page.clone()));
        let session = Arc::new(CannedFetch::new().route("/watch?v=", 200, page));
        let resolver = TranscriptResolver::standard_with_captions(
            &TranscriptSettings::default(),
            Some(Arc::new(NoCaptions)),
            anonymous.clone(),
            Some(session.clone()),
        )
        .unwrap();

        let result = resolver.resolve("abcdefghijk").await;
        assert_eq!(result.error, Some(TranscriptErrorKind::Disabled));
        assert_eq!(
            result.attempts_summary(),
            "caption_api:disabled;watch_page:disabled;authenticated_session:disabled"
        );
        assert_eq!(anonymous.count("/watch?v="), 1);
        assert_eq!(session.count("/watch?v="), 1);
        assert_eq!(anonymous.count("/youtubei/"), 0);
    }

    #[test]
    fn test_audio_requires_api_key() {
        let settings = TranscriptSettings {
            audio_transcription: true,
            openai_api_key: None,
            ..Default::default()
        };
        let fetch: Arc<dyn Fetch> = Arc::new(CannedFetch::new());
        assert!(matches!(
            TranscriptResolver::standard(&settings, fetch, None),
            Err(PipelineError::Configuration(_))
        ));
    }
}
