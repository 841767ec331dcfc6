//! Watch page captions retried with the caller's session cookies.

use std::sync::Arc;

use async_trait::async_trait;

use super::watch_page::{to_failure, WatchPageStrategy};
use super::{TranscriptPreferences, TranscriptStrategy};
use crate::http_client::Fetch;
use crate::models::{StrategyKind, TranscriptFailure, TranscriptText};

/// Runs the watch page flow through an authenticated client, which sees
/// members-only and age-gated caption tracks the anonymous page hides.
pub struct AuthenticatedSessionStrategy {
    page: WatchPageStrategy,
}

impl AuthenticatedSessionStrategy {
    pub fn new(session: Arc<dyn Fetch>) -> Self {
        Self {
            page: WatchPageStrategy::new(session),
        }
    }
}

#[async_trait]
impl TranscriptStrategy for AuthenticatedSessionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AuthenticatedSession
    }

    async fn fetch(
        &self,
        video_id: &str,
        prefs: &TranscriptPreferences,
    ) -> Result<TranscriptText, TranscriptFailure> {
        self.page.captions(video_id, prefs).await.map_err(to_failure)
    }
}
