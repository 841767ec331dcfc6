//! Channel enumeration through `yt-dlp --flat-playlist`.
//!
//! yt-dlp prints one JSON object per entry; entries are forwarded as they
//! arrive so the pipeline can start fetching metadata before the listing is
//! exhausted. Dropping the stream kills the child process.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    classify_short, listing_plan, ChannelEnumerator, Listing, RefItem, TraversalMode,
    VideoRefStream, STREAM_CAPACITY,
};
use crate::error::EnumerationError;
use crate::models::VideoRef;

/// One entry of `yt-dlp --flat-playlist --dump-json` output.
#[derive(Debug, Clone, Deserialize)]
pub struct FlatEntry {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, rename = "_type")]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub ie_key: Option<String>,
}

impl FlatEntry {
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64)
    }

    /// Nested playlists (channel tabs) are not videos.
    fn is_video(&self) -> bool {
        let nested = self.entry_type.as_deref() == Some("playlist")
            || self.ie_key.as_deref() == Some("YoutubeTab");
        !nested && self.id.len() == 11
    }
}

/// Parse one stdout line. Non-JSON lines and non-video entries yield `None`.
pub fn parse_flat_entry(line: &str) -> Option<FlatEntry> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str::<FlatEntry>(line)
        .ok()
        .filter(FlatEntry::is_video)
}

pub struct YtDlpEnumerator {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl YtDlpEnumerator {
    /// Locate `yt-dlp` on `PATH`.
    pub fn locate() -> Result<Self, EnumerationError> {
        let binary =
            which::which("yt-dlp").map_err(|e| EnumerationError::ToolMissing(e.to_string()))?;
        Ok(Self::with_binary(binary))
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            extra_args: Vec::new(),
        }
    }

    /// Arguments appended to every invocation (e.g. `--cookies <file>`).
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn command(&self, listing_url: &str, cap: usize) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--flat-playlist",
            "--dump-json",
            "--no-warnings",
            "--ignore-errors",
            "--playlist-end",
        ]);
        cmd.arg(cap.max(1).to_string());
        cmd.args(&self.extra_args);
        cmd.arg(listing_url);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ChannelEnumerator for YtDlpEnumerator {
    async fn enumerate(
        &self,
        base: &str,
        mode: TraversalMode,
        cap: usize,
    ) -> Result<VideoRefStream, EnumerationError> {
        let listings = listing_plan(base, mode);
        if listings.is_empty() {
            return Err(EnumerationError::unresolvable(base, "no listing URLs for mode"));
        }

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let commands: Vec<(Listing, Command)> = listings
            .iter()
            .map(|l| (l.clone(), self.command(&l.url, cap)))
            .collect();
        let reference = base.to_string();

        tokio::spawn(async move {
            run_listings(reference, commands, tx).await;
        });

        Ok(VideoRefStream::new(rx, listings))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

enum ListingOutcome {
    Completed { yielded: usize },
    Failed(String),
    ReceiverGone,
}

async fn run_listings(
    reference: String,
    commands: Vec<(Listing, Command)>,
    tx: mpsc::Sender<RefItem>,
) {
    let mut seen = HashSet::new();
    let mut order = 0usize;
    let mut failures = Vec::new();
    let total = commands.len();

    for (listing, mut cmd) in commands {
        match run_listing(&listing, &mut cmd, &tx, &mut seen, &mut order).await {
            ListingOutcome::Completed { yielded } => {
                info!("Listing {} yielded {} videos", listing.index, yielded);
            }
            ListingOutcome::Failed(reason) => {
                warn!("Listing {} ({}) failed: {}", listing.index, listing.url, reason);
                failures.push(reason);
            }
            ListingOutcome::ReceiverGone => {
                debug!("Enumeration stream dropped; stopping yt-dlp");
                return;
            }
        }
    }

    if failures.len() == total {
        let reason = failures.join("; ");
        let _ = tx
            .send(Err(EnumerationError::unresolvable(
                &reference,
                format!("every listing failed: {}", reason),
            )))
            .await;
    }
}

async fn run_listing(
    listing: &Listing,
    cmd: &mut Command,
    tx: &mpsc::Sender<RefItem>,
    seen: &mut HashSet<String>,
    order: &mut usize,
) -> ListingOutcome {
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ListingOutcome::Failed(format!("cannot start yt-dlp: {}", e)),
    };
    let Some(stdout) = child.stdout.take() else {
        return ListingOutcome::Failed("yt-dlp stdout unavailable".to_string());
    };
    let stderr_task = child.stderr.take().map(|mut err| {
        tokio::spawn(async move {
            let mut buf = String::new();
            let _ = err.read_to_string(&mut buf).await;
            buf
        })
    });

    let mut lines = BufReader::new(stdout).lines();
    let mut yielded = 0usize;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return ListingOutcome::Failed(format!("reading yt-dlp output: {}", e)),
        };
        let Some(entry) = parse_flat_entry(&line) else {
            continue;
        };
        let is_short = classify_short(entry.url.as_deref(), entry.duration_secs());
        if !listing.filter.admits(is_short) {
            debug!("Skipping {} (short={:?}) in listing {}", entry.id, is_short, listing.index);
            continue;
        }
        if !seen.insert(entry.id.clone()) {
            continue;
        }

        let mut video = VideoRef::new(entry.id.clone(), *order).with_listing(listing.index, &listing.url);
        video.hint_title = entry.title.clone();
        video.hint_duration_secs = entry.duration_secs();
        video.hint_url = entry.url.clone();
        *order += 1;
        yielded += 1;

        if tx.send(Ok(video)).await.is_err() {
            let _ = child.kill().await;
            return ListingOutcome::ReceiverGone;
        }
    }

    let status = child.wait().await;
    let stderr_text = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    match status {
        Ok(status) if status.success() || yielded > 0 => ListingOutcome::Completed { yielded },
        Ok(status) => ListingOutcome::Failed(format!(
            "yt-dlp exited with {}: {}",
            status,
            last_line(&stderr_text)
        )),
        Err(e) => ListingOutcome::Failed(format!("waiting for yt-dlp: {}", e)),
    }
}

fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no error output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_entry_video() {
        let line = r#"{"_type": "url", "ie_key": "Youtube", "id": "dQw4w9WgXcQ", "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "title": "Song", "duration": 212.0, "view_count": 1500000000}"#;
        let entry = parse_flat_entry(line).unwrap();
        assert_eq!(entry.id, "dQw4w9WgXcQ");
        assert_eq!(entry.duration_secs(), Some(212));
        assert_eq!(entry.title.as_deref(), Some("Song"));
    }

    #[test]
    fn test_parse_flat_entry_short_without_duration() {
        let line = r#"{"_type": "url", "id": "abcdefghijk", "url": "https://www.youtube.com/shorts/abcdefghijk", "duration": null}"#;
        let entry = parse_flat_entry(line).unwrap();
        assert_eq!(entry.duration_secs(), None);
        assert_eq!(classify_short(entry.url.as_deref(), entry.duration_secs()), Some(true));
    }

    #[test]
    fn test_parse_flat_entry_rejects_tabs_and_noise() {
        assert!(parse_flat_entry("WARNING: something").is_none());
        assert!(parse_flat_entry("").is_none());
        assert!(parse_flat_entry(r#"{"_type": "playlist", "id": "UCabcdefghijklmnopqrstuv"}"#).is_none());
        assert!(parse_flat_entry(r#"{"id": "UC123", "ie_key": "YoutubeTab"}"#).is_none());
        assert!(parse_flat_entry("{not json").is_none());
    }

    #[test]
    fn test_command_arguments() {
        let enumerator = YtDlpEnumerator::with_binary(PathBuf::from("yt-dlp"));
        let cmd = enumerator.command("https://www.youtube.com/@x/videos", 600);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--flat-playlist".to_string()));
        let cap = args.iter().position(|a| a == "--playlist-end").unwrap();
        assert_eq!(args[cap + 1], "600");
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/@x/videos");
    }

    #[tokio::test]
    async fn test_missing_binary_ends_stream_with_error() {
        let enumerator =
            YtDlpEnumerator::with_binary(PathBuf::from("/nonexistent/tubesift-test/yt-dlp"));
        let mut stream = enumerator
            .enumerate("https://www.youtube.com/@x", TraversalMode::Popular, 10)
            .await
            .unwrap();
        assert_eq!(stream.listing_urls().len(), 1);
        let item = stream.next().await.unwrap();
        assert!(matches!(item, Err(EnumerationError::Unresolvable { .. })));
        assert!(stream.next().await.is_none());
    }
}
