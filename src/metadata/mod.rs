//! Per-video metadata backends.
//!
//! A provider turns a batch of [`VideoRef`]s into one outcome per input, in
//! input order. Per-video failures are `Err(MetadataError::Unavailable)`
//! entries; the outer `Err` is reserved for batch-level failures (quota,
//! transport) that affect every video in the batch.

mod data_api;
mod watch_page;

pub use data_api::{parse_video_item, DataApiProvider};
pub use watch_page::{parse_watch_metadata, WatchPageProvider};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::MetadataError;
use crate::models::{Provenance, SourcedMetadata, VideoRef};

pub type VideoOutcome = Result<SourcedMetadata, MetadataError>;

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch metadata for every ref in `refs`. The returned vector has the
    /// same length and order as `refs`.
    async fn fetch_batch(&self, refs: &[VideoRef]) -> Result<Vec<VideoOutcome>, MetadataError>;

    /// How many refs the pipeline should hand over per call.
    fn batch_size(&self) -> usize;

    fn provenance(&self) -> Provenance;

    fn name(&self) -> &'static str;
}

/// Authoritative provider with an opt-in best-effort fallback.
///
/// Quota exhaustion is always returned to the caller. Only a non-quota
/// transport failure of a whole batch is retried against the fallback, and
/// only when `allow_best_effort_fallback` is set.
pub struct FallbackProvider {
    primary: Arc<dyn MetadataProvider>,
    fallback: Arc<dyn MetadataProvider>,
    allow_best_effort_fallback: bool,
}

impl FallbackProvider {
    pub fn new(
        primary: Arc<dyn MetadataProvider>,
        fallback: Arc<dyn MetadataProvider>,
        allow_best_effort_fallback: bool,
    ) -> Self {
        Self {
            primary,
            fallback,
            allow_best_effort_fallback,
        }
    }
}

#[async_trait]
impl MetadataProvider for FallbackProvider {
    async fn fetch_batch(&self, refs: &[VideoRef]) -> Result<Vec<VideoOutcome>, MetadataError> {
        match self.primary.fetch_batch(refs).await {
            Err(MetadataError::Transport(reason)) if self.allow_best_effort_fallback => {
                warn!(
                    "{} failed for a batch of {} ({}); falling back to {}",
                    self.primary.name(),
                    refs.len(),
                    reason,
                    self.fallback.name()
                );
                let mut outcomes = Vec::with_capacity(refs.len());
                for chunk in refs.chunks(self.fallback.batch_size().max(1)) {
                    outcomes.extend(self.fallback.fetch_batch(chunk).await?);
                }
                Ok(outcomes)
            }
            other => other,
        }
    }

    fn batch_size(&self) -> usize {
        self.primary.batch_size()
    }

    fn provenance(&self) -> Provenance {
        self.primary.provenance()
    }

    fn name(&self) -> &'static str {
        "data-api+watch-page"
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted providers for pipeline tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::models::VideoMetadata;

    /// Serves authoritative metadata from a view-count table. IDs listed in
    /// `fail_at` make the batch containing them fail with the given error.
    #[derive(Default)]
    pub struct TableProvider {
        pub views: HashMap<String, Option<u64>>,
        pub fail_at: HashMap<String, MetadataError>,
        pub batch: usize,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl TableProvider {
        pub fn new(rows: &[(&str, Option<u64>)]) -> Self {
            Self {
                views: rows.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
                batch: 50,
                ..Default::default()
            }
        }

        pub fn fail_on(mut self, video_id: &str, error: MetadataError) -> Self {
            self.fail_at.insert(video_id.to_string(), error);
            self
        }

        pub fn with_batch(mut self, batch: usize) -> Self {
            self.batch = batch;
            self
        }

        pub fn fetched(&self) -> Vec<String> {
            self.calls
                .lock()
                .map(|c| c.iter().flatten().cloned().collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl MetadataProvider for TableProvider {
        async fn fetch_batch(
            &self,
            refs: &[VideoRef],
        ) -> Result<Vec<VideoOutcome>, MetadataError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(refs.iter().map(|r| r.video_id.clone()).collect());
            }
            if let Some(err) = refs.iter().find_map(|r| self.fail_at.get(&r.video_id)) {
                return Err(err.clone());
            }
            Ok(refs
                .iter()
                .map(|r| match self.views.get(&r.video_id) {
                    Some(views) => {
                        let mut metadata = VideoMetadata::new(&r.video_id);
                        metadata.title = format!("Video {}", r.video_id);
                        metadata.view_count = *views;
                        Ok(SourcedMetadata::Authoritative(metadata))
                    }
                    None => Err(MetadataError::unavailable(&r.video_id, "not in table")),
                })
                .collect())
        }

        fn batch_size(&self) -> usize {
            self.batch
        }

        fn provenance(&self) -> Provenance {
            Provenance::Authoritative
        }

        fn name(&self) -> &'static str {
            "table"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TableProvider;
    use super::*;

    fn refs(ids: &[&str]) -> Vec<VideoRef> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| VideoRef::new(*id, i))
            .collect()
    }

    fn failing(error: MetadataError) -> Arc<dyn MetadataProvider> {
        Arc::new(TableProvider::new(&[("a", Some(1))]).fail_on("a", error))
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_when_allowed() {
        let fallback = Arc::new(TableProvider::new(&[("a", Some(7))]).with_batch(1));
        let provider = FallbackProvider::new(
            failing(MetadataError::Transport("connection reset".into())),
            fallback.clone(),
            true,
        );
        let outcomes = provider.fetch_batch(&refs(&["a"])).await.unwrap();
        assert_eq!(outcomes[0].as_ref().unwrap().view_count(), Some(7));
        assert_eq!(fallback.fetched(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_without_opt_in() {
        let fallback = Arc::new(TableProvider::new(&[("a", Some(7))]));
        let provider = FallbackProvider::new(
            failing(MetadataError::Transport("connection reset".into())),
            fallback.clone(),
            false,
        );
        assert!(provider.fetch_batch(&refs(&["a"])).await.is_err());
        assert!(fallback.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_quota_never_degrades() {
        let fallback = Arc::new(TableProvider::new(&[("a", Some(7))]));
        let provider = FallbackProvider::new(
            failing(MetadataError::QuotaExceeded("daily".into())),
            fallback.clone(),
            true,
        );
        let err = provider.fetch_batch(&refs(&["a"])).await.unwrap_err();
        assert!(err.is_quota());
        assert!(fallback.fetched().is_empty());
    }
}
