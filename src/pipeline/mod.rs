//! The scrape pipeline: enumerate, fetch metadata, filter, transcribe, rank.
//!
//! States run `Enumerating -> Filtering -> TranscribingSurvivors -> Done`.
//! Enumeration failures and quota exhaustion move the run to `Aborted` from
//! any state; survivors kept up to that point are still emitted, without
//! transcripts.

mod events;

pub use events::ProgressEvent;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::enumerate::{ChannelEnumerator, TraversalMode, VideoRefStream};
use crate::error::{MetadataError, PipelineError};
use crate::metadata::{MetadataProvider, VideoOutcome};
use crate::models::{
    rank_rows, ScrapeRow, SourcedMetadata, TranscriptErrorKind, TranscriptResult, VideoRef,
};
use crate::ranking::{RankingConfig, RankingFilter, StopReason, Verdict};
use crate::transcript::TranscriptResolver;
use crate::utils::normalize_channel_url;

pub const DEFAULT_TRANSCRIPT_CONCURRENCY: usize = 4;

/// Shared cancellation signal, checked between videos.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Enumerating,
    Filtering,
    TranscribingSurvivors,
    Done,
    Aborted,
}

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    /// Channel reference in any accepted form.
    pub channel: String,
    pub mode: TraversalMode,
    pub ranking: RankingConfig,
    pub transcript_concurrency: usize,
}

impl ScrapeRequest {
    pub fn new(channel: impl Into<String>, mode: TraversalMode) -> Self {
        Self {
            channel: channel.into(),
            mode,
            ranking: RankingConfig::default(),
            transcript_concurrency: DEFAULT_TRANSCRIPT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Completed { stop_reason: StopReason },
    Aborted { error: PipelineError },
}

/// Why a run produced no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroResultCause {
    /// The channel listing had no videos.
    EnumerationEmpty,
    /// Videos were scanned but none reached the threshold.
    NothingQualified,
    EarlyStop,
    ScanLimit,
    Cancelled,
    Aborted,
}

impl ZeroResultCause {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::EnumerationEmpty => "the channel listing returned no videos",
            Self::NothingQualified => "no scanned video reached the view threshold",
            Self::EarlyStop => "scanning stopped early after a run of videos below the threshold",
            Self::ScanLimit => "the scan limit was reached before any video qualified",
            Self::Cancelled => "the run was cancelled",
            Self::Aborted => "the run aborted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub base_url: Option<String>,
    pub listing_urls: Vec<String>,
    pub rows: Vec<ScrapeRow>,
    pub outcome: Outcome,
    pub final_state: PipelineState,
    /// References received from the enumerator.
    pub enumerated: usize,
    /// Metadata outcomes fed to the filter.
    pub scanned: usize,
    pub kept: usize,
    pub metadata_unavailable: usize,
    pub zero_result_cause: Option<ZeroResultCause>,
}

impl RunReport {
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, Outcome::Aborted { .. })
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.outcome {
            Outcome::Completed { stop_reason } => Some(stop_reason),
            Outcome::Aborted { .. } => None,
        }
    }
}

/// Result of the filtering phase.
struct FilterPass {
    survivors: Vec<SourcedMetadata>,
    stop: Result<StopReason, PipelineError>,
    enumerated: usize,
}

pub struct ScrapePipeline {
    enumerator: Arc<dyn ChannelEnumerator>,
    metadata: Arc<dyn MetadataProvider>,
    resolver: Arc<TranscriptResolver>,
    events: Option<mpsc::Sender<ProgressEvent>>,
    cancel: CancelFlag,
}

impl ScrapePipeline {
    pub fn new(
        enumerator: Arc<dyn ChannelEnumerator>,
        metadata: Arc<dyn MetadataProvider>,
        resolver: Arc<TranscriptResolver>,
    ) -> Self {
        Self {
            enumerator,
            metadata,
            resolver,
            events: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_events(mut self, events: mpsc::Sender<ProgressEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    async fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    pub async fn run(&self, request: &ScrapeRequest) -> RunReport {
        let mut report = RunReport {
            base_url: None,
            listing_urls: Vec::new(),
            rows: Vec::new(),
            outcome: Outcome::Completed {
                stop_reason: StopReason::ThresholdExhaustedStream,
            },
            final_state: PipelineState::Enumerating,
            enumerated: 0,
            scanned: 0,
            kept: 0,
            metadata_unavailable: 0,
            zero_result_cause: None,
        };

        let base = match normalize_channel_url(&request.channel) {
            Ok(base) => base,
            Err(e) => return self.abort(report, e.into(), Vec::new()).await,
        };
        report.base_url = Some(base.clone());
        self.emit(ProgressEvent::Started {
            base: base.clone(),
            mode: request.mode,
        })
        .await;
        info!(
            "Scanning {} ({} mode, threshold {}, scan limit {}) with {}",
            base,
            request.mode.as_str(),
            request.ranking.min_views,
            request.ranking.scan_limit,
            self.enumerator.name()
        );

        let mut stream = match self
            .enumerator
            .enumerate(&base, request.mode, request.ranking.scan_limit)
            .await
        {
            Ok(stream) => stream,
            Err(e) => return self.abort(report, e.into(), Vec::new()).await,
        };
        report.listing_urls = stream.listing_urls();
        for listing in stream.listings() {
            self.emit(ProgressEvent::ListingResolved {
                index: listing.index,
                url: listing.url.clone(),
            })
            .await;
        }

        report.final_state = PipelineState::Filtering;
        let mut filter = RankingFilter::new(request.ranking.clone(), stream.listings());
        let pass = self.filter_stream(&mut stream, &mut filter).await;
        drop(stream);

        report.enumerated = pass.enumerated;
        report.scanned = filter.scanned();
        report.kept = filter.kept();
        report.metadata_unavailable = filter.unavailable();

        let stop_reason = match pass.stop {
            Ok(reason) => reason,
            Err(error) => return self.abort(report, error, pass.survivors).await,
        };
        info!(
            "Scan ended ({}): {} scanned, {} kept, {} unavailable",
            stop_reason, report.scanned, report.kept, report.metadata_unavailable
        );
        self.emit(ProgressEvent::Stopped {
            reason: stop_reason,
        })
        .await;

        report.final_state = PipelineState::TranscribingSurvivors;
        let mut rows = self
            .transcribe(pass.survivors, request.transcript_concurrency)
            .await;
        rank_rows(&mut rows);
        let stop_reason = if self.cancel.is_cancelled() {
            StopReason::Cancelled
        } else {
            stop_reason
        };

        report.rows = rows;
        report.outcome = Outcome::Completed { stop_reason };
        report.final_state = PipelineState::Done;
        if report.rows.is_empty() {
            report.zero_result_cause = Some(match stop_reason {
                StopReason::Cancelled => ZeroResultCause::Cancelled,
                _ if report.enumerated == 0 => ZeroResultCause::EnumerationEmpty,
                StopReason::EarlyStopTriggered => ZeroResultCause::EarlyStop,
                StopReason::ScanLimitReached => ZeroResultCause::ScanLimit,
                _ => ZeroResultCause::NothingQualified,
            });
        }
        self.emit(ProgressEvent::Finished {
            rows: report.rows.len(),
            aborted: false,
        })
        .await;
        report
    }

    async fn abort(
        &self,
        mut report: RunReport,
        error: PipelineError,
        survivors: Vec<SourcedMetadata>,
    ) -> RunReport {
        error!("Run aborted: {}", error);
        let mut rows: Vec<ScrapeRow> = survivors
            .into_iter()
            .map(|metadata| {
                let transcript = TranscriptResult::failure(
                    metadata.video_id(),
                    TranscriptErrorKind::NotAttempted,
                    Vec::new(),
                );
                ScrapeRow::assemble(metadata, transcript)
            })
            .collect();
        rank_rows(&mut rows);
        if !rows.is_empty() {
            warn!("Emitting {} rows kept before the abort, without transcripts", rows.len());
        }

        report.rows = rows;
        report.outcome = Outcome::Aborted { error };
        report.final_state = PipelineState::Aborted;
        if report.rows.is_empty() {
            report.zero_result_cause = Some(ZeroResultCause::Aborted);
        }
        self.emit(ProgressEvent::Finished {
            rows: report.rows.len(),
            aborted: true,
        })
        .await;
        report
    }

    /// Pull refs from the stream in batches, fetch metadata and feed the
    /// filter in enumeration order until the stream ends or the filter stops.
    async fn filter_stream(
        &self,
        stream: &mut VideoRefStream,
        filter: &mut RankingFilter,
    ) -> FilterPass {
        let batch_size = self.metadata.batch_size().max(1);
        let mut survivors = Vec::new();
        let mut pending: Vec<VideoRef> = Vec::new();
        let mut enumerated = 0usize;

        let stop = loop {
            if self.cancel.is_cancelled() {
                info!("Cancelled during scan");
                break Ok(StopReason::Cancelled);
            }

            let next = stream.next().await;
            let end_of_stream = next.is_none();
            match next {
                Some(Err(e)) => break Err(PipelineError::from(e)),
                Some(Ok(video)) => {
                    enumerated += 1;
                    if filter.is_exhausted(video.listing) {
                        continue;
                    }
                    pending.push(video);
                }
                None => {}
            }

            let flush_at = filter
                .config()
                .scan_limit
                .saturating_sub(filter.scanned())
                .clamp(1, batch_size);
            if pending.is_empty() || (!end_of_stream && pending.len() < flush_at) {
                if end_of_stream {
                    break Ok(filter.finish());
                }
                continue;
            }

            let batch = std::mem::take(&mut pending);
            if let Err(e) = self.process_batch(&batch, filter, &mut survivors).await {
                break Err(e);
            }
            if let Some(reason) = filter.stop_reason() {
                break Ok(reason);
            }
            if end_of_stream {
                break Ok(filter.finish());
            }
        };

        FilterPass {
            survivors,
            stop,
            enumerated,
        }
    }

    async fn process_batch(
        &self,
        batch: &[VideoRef],
        filter: &mut RankingFilter,
        survivors: &mut Vec<SourcedMetadata>,
    ) -> Result<(), PipelineError> {
        let outcomes: Vec<VideoOutcome> = match self.metadata.fetch_batch(batch).await {
            Ok(outcomes) => outcomes,
            Err(e @ MetadataError::QuotaExceeded(_)) => return Err(e.into()),
            Err(e) => {
                warn!("Metadata batch of {} failed: {}", batch.len(), e);
                batch
                    .iter()
                    .map(|r| Err(MetadataError::unavailable(&r.video_id, e.to_string())))
                    .collect()
            }
        };

        for (video, outcome) in batch.iter().zip(outcomes) {
            if filter.stop_reason().is_some() {
                break;
            }
            if filter.is_exhausted(video.listing) {
                continue;
            }
            let verdict = filter.observe(video, &outcome);
            let views = outcome.as_ref().ok().and_then(|m| m.view_count());
            self.emit(ProgressEvent::Scanned {
                video_id: video.video_id.clone(),
                views,
                verdict,
                scanned: filter.scanned(),
            })
            .await;

            if let (Verdict::Kept, Ok(metadata)) = (verdict, outcome) {
                debug!("Kept {} ({:?} views)", video.video_id, views);
                self.emit(ProgressEvent::Kept {
                    video_id: video.video_id.clone(),
                    title: metadata.metadata().title.clone(),
                    views,
                    kept: filter.kept(),
                })
                .await;
                survivors.push(metadata);
            }
        }
        Ok(())
    }

    async fn transcribe(&self, survivors: Vec<SourcedMetadata>, concurrency: usize) -> Vec<ScrapeRow> {
        let total = survivors.len();
        let results: Arc<Mutex<Vec<(usize, ScrapeRow)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(total);

        for (index, metadata) in survivors.into_iter().enumerate() {
            let results = results.clone();
            let semaphore = semaphore.clone();
            let resolver = self.resolver.clone();
            let cancel = self.cancel.clone();
            let events = self.events.clone();

            handles.push(tokio::spawn(async move {
                let video_id = metadata.video_id().to_string();
                let _permit = semaphore.acquire_owned().await.ok();

                let transcript = if cancel.is_cancelled() {
                    TranscriptResult::failure(&video_id, TranscriptErrorKind::Cancelled, Vec::new())
                } else {
                    if let Some(tx) = &events {
                        let _ = tx
                            .send(ProgressEvent::TranscriptStarted {
                                video_id: video_id.clone(),
                                total,
                            })
                            .await;
                    }
                    resolver.resolve(&video_id).await
                };

                if let Some(tx) = &events {
                    let _ = tx
                        .send(ProgressEvent::TranscriptFinished {
                            video_id: video_id.clone(),
                            error: transcript.error,
                            strategy: transcript.source_strategy,
                        })
                        .await;
                }
                results
                    .lock()
                    .await
                    .push((index, ScrapeRow::assemble(metadata, transcript)));
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Transcript task failed: {}", e);
            }
        }

        let mut rows = std::mem::take(&mut *results.lock().await);
        rows.sort_by_key(|(index, _)| *index);
        rows.into_iter().map(|(_, row)| row).collect()
    }
}
