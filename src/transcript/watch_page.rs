//! Captions from the track list embedded in the watch page itself.
//!
//! The page is fetched once, its caption renderer is read with
//! [`parse_caption_tracks`], and the chosen track is downloaded from
//! timedtext. Every failure shape is captured as a [`CaptionFailure`] and
//! mapped onto the fixed taxonomy by [`classify_page_failure`]. The
//! authenticated session strategy reuses the same flow.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::formats::caption_text;
use super::tracks::{parse_caption_tracks, select_track, CaptionTrack};
use super::{TranscriptPreferences, TranscriptStrategy};
use crate::http_client::{Fetch, FetchError, FetchedPage};
use crate::models::{StrategyKind, TranscriptErrorKind, TranscriptFailure, TranscriptText};
use crate::watch_page::{fetch_watch_page, Playability, WatchPage};

/// Which request produced an unexpected HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    WatchPage,
    Timedtext,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Self::WatchPage => "watch page",
            Self::Timedtext => "timedtext",
        }
    }
}

/// Raw failure shapes seen while reading captions off a watch page.
#[derive(Debug, Clone, Error)]
pub enum CaptionFailure {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("{} returned HTTP {status}", .stage.as_str())]
    HttpStatus { stage: Stage, status: u16 },
    #[error("recaptcha page served")]
    Captcha,
    #[error("consent wall served")]
    ConsentWall,
    #[error("no player response")]
    MissingPlayerResponse,
    #[error("playability {status}: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Playability {
        status: String,
        reason: Option<String>,
    },
    #[error("no caption renderer")]
    NoCaptionRenderer,
    #[error("caption track list is empty")]
    NoTracks,
    #[error("no usable track among {available:?}")]
    NoMatchingTrack { available: Vec<String> },
    #[error("unknown caption track layout: {0}")]
    UnknownTrackLayout(String),
    #[error("unparsable payload: {0}")]
    UnparsablePayload(String),
    #[error("caption payload is empty")]
    EmptyPayload,
}

/// Translate a watch page failure into the fixed error taxonomy.
pub fn classify_page_failure(failure: &CaptionFailure) -> TranscriptErrorKind {
    use CaptionFailure as F;
    match failure {
        F::Transport(_) => TranscriptErrorKind::Network,
        F::HttpStatus { status: 429, .. } | F::HttpStatus { status: 403, .. } => {
            TranscriptErrorKind::RateLimited
        }
        F::HttpStatus {
            stage: Stage::Timedtext,
            status: 404,
        } => TranscriptErrorKind::NotFound,
        F::HttpStatus { status: 404, .. } | F::HttpStatus { status: 410, .. } => {
            TranscriptErrorKind::Unavailable
        }
        F::HttpStatus { status, .. } if *status >= 500 => TranscriptErrorKind::Network,
        F::HttpStatus { .. } => TranscriptErrorKind::UnsupportedLayout,
        F::Captcha => TranscriptErrorKind::RateLimited,
        F::Playability { status, reason } => {
            let playability = Playability {
                status: status.clone(),
                reason: reason.clone(),
            };
            if playability.is_bot_check() {
                TranscriptErrorKind::RateLimited
            } else {
                TranscriptErrorKind::Unavailable
            }
        }
        F::NoCaptionRenderer | F::NoTracks => TranscriptErrorKind::Disabled,
        F::NoMatchingTrack { .. } => TranscriptErrorKind::NotFound,
        F::ConsentWall
        | F::MissingPlayerResponse
        | F::UnknownTrackLayout(_)
        | F::UnparsablePayload(_) => TranscriptErrorKind::UnsupportedLayout,
        F::EmptyPayload => TranscriptErrorKind::Empty,
    }
}

pub(super) fn to_failure(failure: CaptionFailure) -> TranscriptFailure {
    TranscriptFailure::new(classify_page_failure(&failure), failure.to_string())
}

/// Fetch the watch page and reject blocked or unusable responses.
async fn load_watch_page(fetch: &dyn Fetch, video_id: &str) -> Result<WatchPage, CaptionFailure> {
    let (response, page) = fetch_watch_page(fetch, video_id).await?;
    check_response(Stage::WatchPage, &response)?;
    if page.captcha {
        return Err(CaptionFailure::Captcha);
    }
    if page.consent_wall {
        return Err(CaptionFailure::ConsentWall);
    }
    Ok(page)
}

fn check_response(stage: Stage, response: &FetchedPage) -> Result<(), CaptionFailure> {
    if response.is_success() {
        Ok(())
    } else {
        Err(CaptionFailure::HttpStatus {
            stage,
            status: response.status,
        })
    }
}

fn check_playability(player: &Value) -> Result<(), CaptionFailure> {
    match Playability::from_player_response(player) {
        Some(p) if !p.is_ok() => Err(CaptionFailure::Playability {
            status: p.status,
            reason: p.reason,
        }),
        _ => Ok(()),
    }
}

async fn download_track(fetch: &dyn Fetch, track: &CaptionTrack) -> Result<TranscriptText, CaptionFailure> {
    let response = fetch.get(&track.base_url).await?;
    check_response(Stage::Timedtext, &response)?;
    if response.body.trim().is_empty() {
        return Err(CaptionFailure::EmptyPayload);
    }
    let text = caption_text(&response.body).map_err(CaptionFailure::UnparsablePayload)?;
    if text.is_empty() {
        return Err(CaptionFailure::EmptyPayload);
    }
    Ok(TranscriptText {
        text,
        language: Some(track.language_code.clone()),
    })
}

pub struct WatchPageStrategy {
    fetch: Arc<dyn Fetch>,
}

impl WatchPageStrategy {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self { fetch }
    }

    /// Run the page flow, returning the raw failure on error. The page is
    /// requested once per call.
    pub async fn captions(
        &self,
        video_id: &str,
        prefs: &TranscriptPreferences,
    ) -> Result<TranscriptText, CaptionFailure> {
        let page = load_watch_page(self.fetch.as_ref(), video_id).await?;
        let player = page
            .player_response
            .as_ref()
            .ok_or(CaptionFailure::MissingPlayerResponse)?;
        check_playability(player)?;

        let tracks = parse_caption_tracks(page.caption_renderer())?;
        let track = select_track(&tracks, &prefs.languages, prefs.allow_generated)?;
        debug!(
            "Selected {} caption track {} of {}",
            if track.generated { "generated" } else { "manual" },
            track.language_code,
            tracks.len()
        );
        download_track(self.fetch.as_ref(), track).await
    }
}

#[async_trait]
impl TranscriptStrategy for WatchPageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WatchPage
    }

    async fn fetch(
        &self,
        video_id: &str,
        prefs: &TranscriptPreferences,
    ) -> Result<TranscriptText, TranscriptFailure> {
        self.captions(video_id, prefs).await.map_err(to_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::http_client::CannedFetch;
    use crate::watch_page::fixtures::watch_html;

    const ID: &str = "abcdefghijk";

    #[tokio::test]
    async fn test_vtt_track_from_page() {
        let player = json!({
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://www.youtube.com/api/timedtext?v=abcdefghijk&lang=de", "languageCode": "de"},
                {"baseUrl": "https://www.youtube.com/api/timedtext?v=abcdefghijk&lang=en", "languageCode": "en", "kind": "asr"}
            ]}}
        });
        let fetch = Arc::new(
            CannedFetch::new()
                .route("/watch?v=", 200, watch_html(&player, None))
                .route("lang=en", 200, "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nauto english\n")
                .route("lang=de", 200, "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nhallo\n"),
        );
        let prefs = TranscriptPreferences {
            languages: vec!["en".into()],
            allow_generated: true,
        };
        let text = WatchPageStrategy::new(fetch.clone()).captions(ID, &prefs).await.unwrap();
        assert_eq!(text.text, "auto english");
        assert_eq!(fetch.count("/watch?v="), 1);
    }

    #[tokio::test]
    async fn test_srv1_track_from_page() {
        let player = json!({
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://www.youtube.com/api/timedtext?v=abcdefghijk&lang=en&fmt=srv3",
                 "languageCode": "en", "name": {"runs": [{"text": "English"}]}}
            ]}}
        });
        let fetch = Arc::new(
            CannedFetch::new()
                .route("/watch?v=", 200, watch_html(&player, None))
                .route(
                    "/api/timedtext",
                    200,
                    r#"<transcript><text start="0" dur="1">hello</text><text start="1" dur="1">world</text></transcript>"#,
                ),
        );
        let text = WatchPageStrategy::new(fetch.clone())
            .captions(ID, &TranscriptPreferences::default())
            .await
            .unwrap();
        assert_eq!(text.text, "hello world");
        assert_eq!(text.language.as_deref(), Some("en"));
        assert!(!fetch.requests()[1].contains("fmt=srv3"));
    }

    #[tokio::test]
    async fn test_captions_disabled() {
        let player = json!({"playabilityStatus": {"status": "OK"}});
        let fetch = Arc::new(CannedFetch::new().route("/watch?v=", 200, watch_html(&player, None)));
        let err = WatchPageStrategy::new(fetch)
            .fetch(ID, &TranscriptPreferences::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TranscriptErrorKind::Disabled);
    }

    #[tokio::test]
    async fn test_throttled_watch_page() {
        let fetch = Arc::new(CannedFetch::new().route("/watch?v=", 429, ""));
        let err = WatchPageStrategy::new(fetch)
            .fetch(ID, &TranscriptPreferences::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TranscriptErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_unavailable_video() {
        let player = json!({"playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"}});
        let fetch = Arc::new(CannedFetch::new().route("/watch?v=", 200, watch_html(&player, None)));
        let err = WatchPageStrategy::new(fetch)
            .fetch(ID, &TranscriptPreferences::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TranscriptErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_page_without_player_response() {
        let fetch = Arc::new(CannedFetch::new().route("/watch?v=", 200, "<html><body></body></html>"));
        let err = WatchPageStrategy::new(fetch)
            .fetch(ID, &TranscriptPreferences::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TranscriptErrorKind::UnsupportedLayout);
    }

    #[test]
    fn test_classify_page_failure() {
        let cases = [
            (CaptionFailure::Captcha, TranscriptErrorKind::RateLimited),
            (CaptionFailure::NoCaptionRenderer, TranscriptErrorKind::Disabled),
            (CaptionFailure::NoTracks, TranscriptErrorKind::Disabled),
            (
                CaptionFailure::NoMatchingTrack { available: vec!["de".into()] },
                TranscriptErrorKind::NotFound,
            ),
            (
                CaptionFailure::HttpStatus { stage: Stage::Timedtext, status: 404 },
                TranscriptErrorKind::NotFound,
            ),
            (
                CaptionFailure::HttpStatus { stage: Stage::WatchPage, status: 404 },
                TranscriptErrorKind::Unavailable,
            ),
            (
                CaptionFailure::HttpStatus { stage: Stage::WatchPage, status: 400 },
                TranscriptErrorKind::UnsupportedLayout,
            ),
            (
                CaptionFailure::Playability {
                    status: "LOGIN_REQUIRED".into(),
                    reason: Some("Sign in to confirm you're not a bot".into()),
                },
                TranscriptErrorKind::RateLimited,
            ),
            (
                CaptionFailure::Playability {
                    status: "LOGIN_REQUIRED".into(),
                    reason: Some("This video may be inappropriate for some users.".into()),
                },
                TranscriptErrorKind::Unavailable,
            ),
            (
                CaptionFailure::UnparsablePayload("x".into()),
                TranscriptErrorKind::UnsupportedLayout,
            ),
            (CaptionFailure::EmptyPayload, TranscriptErrorKind::Empty),
            (
                CaptionFailure::Transport(FetchError::Timeout { url: "u".into() }),
                TranscriptErrorKind::Network,
            ),
        ];
        for (failure, expected) in cases {
            assert_eq!(classify_page_failure(&failure), expected, "{:?}", failure);
        }
    }
}
