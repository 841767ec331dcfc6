//! The `scrape` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use tokio::sync::mpsc;

use super::progress::ScanProgress;
use crate::config::Settings;
use crate::enumerate::{ChannelEnumerator, DataApiEnumerator, TraversalMode, YtDlpEnumerator};
use crate::http_client::{Fetch, HttpClient};
use crate::metadata::{DataApiProvider, FallbackProvider, MetadataProvider, WatchPageProvider};
use crate::output::{default_file_name, write_csv, write_rows};
use crate::pipeline::{
    CancelFlag, Outcome, ProgressEvent, RunReport, ScrapePipeline, ScrapeRequest,
};
use crate::rate_limiter::RateLimiter;
use crate::transcript::TranscriptResolver;
use crate::youtube_api::DataApiClient;

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Channel URL or handle (e.g. @veritasium)
    pub channel: String,

    /// Listing order and content to scan
    #[arg(short, long, value_enum)]
    pub mode: Option<TraversalMode>,

    /// Minimum views for a video to be kept (default: 300000)
    #[arg(long)]
    pub min_views: Option<u64>,

    /// Maximum videos to examine (default: 600)
    #[arg(long)]
    pub scan_limit: Option<usize>,

    /// Stop after this many consecutive videos below the threshold (0 = never)
    #[arg(long)]
    pub streak: Option<usize>,

    /// Maximum rows to keep (0 = unlimited)
    #[arg(long)]
    pub max_results: Option<usize>,

    /// YouTube Data API key (also read from YT_API_KEY / YOUTUBE_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Fall back to watch-page metadata when a Data API request fails
    #[arg(long)]
    pub best_effort_fallback: bool,

    /// Cookie file (Netscape cookies.txt or JSON export) for authenticated retries
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Skip the InnerTube caption API strategy
    #[arg(long)]
    pub no_caption_api: bool,

    /// Skip the watch page caption strategy
    #[arg(long)]
    pub no_watch_page: bool,

    /// Transcribe audio when no captions are found (needs OPENAI_API_KEY)
    #[arg(long)]
    pub audio: bool,

    /// Preferred caption languages, most preferred first
    #[arg(long, value_delimiter = ',')]
    pub lang: Vec<String>,

    /// Reject auto-generated captions
    #[arg(long)]
    pub no_generated: bool,

    /// Transcription model for audio transcription
    #[arg(long)]
    pub model: Option<String>,

    /// Concurrent transcript lookups (default: 4)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Fixed delay between requests in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Override the User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Path to the yt-dlp binary
    #[arg(long)]
    pub yt_dlp: Option<PathBuf>,

    /// Output CSV path (default: derived from the channel)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the CSV to stdout instead of a file
    #[arg(long, conflicts_with = "output")]
    pub stdout: bool,

    /// Hide the progress display
    #[arg(long)]
    pub no_progress: bool,
}

impl ScrapeArgs {
    /// Apply command line overrides on top of file and environment settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(min_views) = self.min_views {
            settings.ranking.min_views = min_views;
        }
        if let Some(scan_limit) = self.scan_limit {
            settings.ranking.scan_limit = scan_limit;
        }
        if let Some(streak) = self.streak {
            settings.ranking.streak_limit = streak;
        }
        if let Some(max_results) = self.max_results {
            settings.ranking.max_results = (max_results > 0).then_some(max_results);
        }
        if let Some(ref key) = self.api_key {
            settings.youtube_api_key = Some(key.clone());
        }
        if self.best_effort_fallback {
            settings.allow_best_effort_fallback = true;
        }

        let transcripts = &mut settings.transcripts;
        if let Some(ref cookies) = self.cookies {
            let expanded = shellexpand::tilde(&cookies.to_string_lossy()).to_string();
            transcripts.cookie_file = Some(PathBuf::from(expanded));
        }
        if self.no_caption_api {
            transcripts.caption_api = false;
        }
        if self.no_watch_page {
            transcripts.watch_page = false;
        }
        if self.audio {
            transcripts.audio_transcription = true;
        }
        if !self.lang.is_empty() {
            transcripts.preferences.languages = self.lang.clone();
        }
        if self.no_generated {
            transcripts.preferences.allow_generated = false;
        }
        if let Some(ref model) = self.model {
            transcripts.transcription_model = model.clone();
        }

        if let Some(concurrency) = self.concurrency {
            settings.transcript_concurrency = concurrency.max(1);
        }
        if let Some(timeout) = self.timeout {
            settings.http.timeout = Duration::from_secs(timeout);
        }
        if let Some(delay) = self.delay_ms {
            settings.http.request_delay = Duration::from_millis(delay);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.http.user_agent = Some(user_agent.clone());
        }
        if let Some(ref yt_dlp) = self.yt_dlp {
            settings.yt_dlp = Some(yt_dlp.clone());
        }
        if let Some(ref output) = self.output {
            settings.output = Some(output.clone());
        }
    }
}

/// Wire up enumerator, metadata provider and transcript chain from settings.
fn build_pipeline(settings: &Settings) -> anyhow::Result<ScrapePipeline> {
    let rate_limiter = RateLimiter::new();
    let anonymous: Arc<dyn Fetch> = Arc::new(HttpClient::new(&settings.http, rate_limiter.clone())?);

    let cookie_file = settings.transcripts.cookie_file.as_deref();
    let session: Option<Arc<dyn Fetch>> = match cookie_file {
        Some(path) => Some(Arc::new(HttpClient::with_cookie_file(
            &settings.http,
            rate_limiter.clone(),
            path,
        )?)),
        None => None,
    };

    let api = settings
        .youtube_api_key
        .as_ref()
        .map(|key| DataApiClient::new(anonymous.clone(), key.clone()));

    let enumerator: Arc<dyn ChannelEnumerator> = match (&api, settings.mode) {
        (Some(api), TraversalMode::Recent) => Arc::new(DataApiEnumerator::new(api.clone())),
        _ => {
            let ytdlp = match &settings.yt_dlp {
                Some(binary) => YtDlpEnumerator::with_binary(binary.clone()),
                None => YtDlpEnumerator::locate()?,
            };
            let extra_args = cookie_file
                .map(|path| vec!["--cookies".to_string(), path.to_string_lossy().to_string()])
                .unwrap_or_default();
            Arc::new(ytdlp.with_extra_args(extra_args))
        }
    };

    let best_effort: Arc<dyn MetadataProvider> = Arc::new(WatchPageProvider::new(anonymous.clone()));
    let metadata: Arc<dyn MetadataProvider> = match api {
        Some(api) if settings.allow_best_effort_fallback => Arc::new(FallbackProvider::new(
            Arc::new(DataApiProvider::new(api)),
            best_effort,
            true,
        )),
        Some(api) => Arc::new(DataApiProvider::new(api)),
        None => best_effort,
    };

    let resolver = TranscriptResolver::standard(&settings.transcripts, anonymous, session)?;
    tracing::info!(
        "Using {} enumeration, {} metadata, transcript chain [{}]",
        enumerator.name(),
        metadata.name(),
        resolver
            .strategy_kinds()
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(ScrapePipeline::new(enumerator, metadata, Arc::new(resolver)))
}

/// Scan a channel and write the ranked rows as CSV.
pub async fn cmd_scrape(mut settings: Settings, args: &ScrapeArgs) -> anyhow::Result<()> {
    args.apply(&mut settings);

    if settings.youtube_api_key.is_none() {
        println!(
            "{} No Data API key; view counts come from watch pages and may be approximate",
            style("!").yellow()
        );
    }

    let cancel = CancelFlag::new();
    let (event_tx, mut event_rx) = mpsc::channel::<ProgressEvent>(100);
    let pipeline = build_pipeline(&settings)?
        .with_cancel(cancel.clone())
        .with_events(event_tx);

    let mut request = ScrapeRequest::new(args.channel.clone(), settings.mode);
    request.ranking = settings.ranking.clone();
    request.transcript_concurrency = settings.transcript_concurrency;

    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "{} Cancelling; finishing the current video...",
                    style("!").yellow()
                );
                cancel.cancel();
            }
        }
    });

    let progress = ScanProgress::new(!args.no_progress && !args.stdout)?;
    let progress_clone = progress.clone();
    let event_handler = tokio::spawn(async move {
        let mut kept = 0usize;
        while let Some(event) = event_rx.recv().await {
            match event {
                ProgressEvent::Started { base, mode } => {
                    progress_clone.println(&format!(
                        "{} Scanning {} ({})",
                        style("→").cyan(),
                        base,
                        mode.as_str()
                    ));
                }
                ProgressEvent::ListingResolved { index, url } => {
                    progress_clone.println(&format!("  {} listing {}: {}", style("→").dim(), index, url));
                }
                ProgressEvent::Scanned { scanned, .. } => {
                    progress_clone.scanning(scanned, kept);
                }
                ProgressEvent::Kept {
                    title,
                    views,
                    kept: count,
                    ..
                } => {
                    kept = count;
                    let views = views.map(|v| v.to_string()).unwrap_or_default();
                    progress_clone.println(&format!(
                        "{} {:>12}  {}",
                        style("✓").green(),
                        views,
                        title
                    ));
                }
                ProgressEvent::Stopped { reason } => {
                    progress_clone.println(&format!(
                        "{} Scan stopped: {}",
                        style("→").cyan(),
                        reason
                    ));
                    progress_clone.start_transcripts(kept);
                }
                ProgressEvent::TranscriptStarted { .. } => {}
                ProgressEvent::TranscriptFinished {
                    video_id, error, ..
                } => {
                    if let Some(error) = error {
                        tracing::debug!("No transcript for {}: {}", video_id, error.as_str());
                    }
                    progress_clone.transcript_done();
                }
                ProgressEvent::Finished { .. } => {}
            }
        }
    });

    let report = pipeline.run(&request).await;
    drop(pipeline);

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }
    ctrl_c.abort();
    progress.finish();

    if args.stdout {
        write_rows(std::io::stdout().lock(), &report.rows)?;
    } else {
        let path = settings.output.clone().unwrap_or_else(|| {
            PathBuf::from(default_file_name(
                report.base_url.as_deref(),
                settings.mode.as_str(),
            ))
        });
        write_csv(&path, &report.rows)?;
        println!(
            "{} Wrote {} rows to {}",
            style("✓").green(),
            report.rows.len(),
            path.display()
        );
    }

    print_summary(&report);

    match report.outcome {
        Outcome::Aborted { error } => Err(anyhow::anyhow!("run aborted: {}", error)),
        Outcome::Completed { .. } => Ok(()),
    }
}

fn print_summary(report: &RunReport) {
    eprintln!(
        "  {} {} scanned, {} kept, {} without metadata",
        style("→").dim(),
        report.scanned,
        report.kept,
        report.metadata_unavailable
    );

    let transcribed = report.rows.iter().filter(|r| r.transcript.is_success()).count();
    if !report.rows.is_empty() {
        eprintln!(
            "  {} {}/{} transcripts found",
            style("→").dim(),
            transcribed,
            report.rows.len()
        );
    }

    if let Some(cause) = report.zero_result_cause {
        eprintln!("{} No videos kept: {}", style("!").yellow(), cause.describe());
        for url in &report.listing_urls {
            eprintln!("  {} {}", style("→").dim(), url);
        }
    }

    if let Outcome::Aborted { ref error } = report.outcome {
        eprintln!("{} {}", style("✗").red(), error);
        if !report.rows.is_empty() {
            eprintln!(
                "  {} {} rows kept before the error were written without transcripts",
                style("!").yellow(),
                report.rows.len()
            );
        }
    }
}
