//! Transcription of downloaded audio.
//!
//! Audio is fetched with yt-dlp into a temporary directory (removed when the
//! attempt ends) and posted to an OpenAI-compatible transcription endpoint.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{TranscriptPreferences, TranscriptStrategy};
use crate::models::{
    watch_url, StrategyKind, TranscriptErrorKind, TranscriptFailure, TranscriptText,
};

/// Upload limit of the transcription endpoint.
pub const MAX_AUDIO_BYTES: u64 = 25 * 1024 * 1024;

pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-mini-transcribe";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const AUDIO_FORMAT: &str = "bestaudio[filesize<25M]/bestaudio[ext=m4a][filesize<25M]/\
bestaudio[ext=webm][filesize<25M]/worstaudio/worstaudio[ext=m4a]/worstaudio[ext=webm]";

fn download_failed(detail: impl Into<String>) -> TranscriptFailure {
    TranscriptFailure::new(TranscriptErrorKind::AudioDownloadFailed, detail)
}

fn transcription_failed(detail: impl Into<String>) -> TranscriptFailure {
    TranscriptFailure::new(TranscriptErrorKind::AudioTranscriptionFailed, detail)
}

/// Downloads a video's audio track into a directory.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn download(&self, video_id: &str, dir: &Path) -> Result<PathBuf, TranscriptFailure>;
}

/// Speech-to-text backend.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<TranscriptText, TranscriptFailure>;
}

pub struct YtDlpAudio {
    binary: PathBuf,
    max_bytes: u64,
    extra_args: Vec<String>,
}

impl YtDlpAudio {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            max_bytes: MAX_AUDIO_BYTES,
            extra_args: Vec::new(),
        }
    }

    /// Arguments appended to every invocation (e.g. `--cookies <file>`).
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn command(&self, video_id: &str, dir: &Path) -> Command {
        let template = dir.join("%(id)s.%(ext)s");
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--no-playlist", "--no-progress", "--quiet", "--format", AUDIO_FORMAT]);
        cmd.arg("--output").arg(template);
        cmd.args(&self.extra_args);
        cmd.arg(watch_url(video_id));
        cmd.stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Find the file yt-dlp wrote for `video_id` and enforce the size limit.
async fn find_download(dir: &Path, video_id: &str, max_bytes: u64) -> Result<PathBuf, TranscriptFailure> {
    let prefix = format!("{}.", video_id);
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| download_failed(format!("reading {}: {}", dir.display(), e)))?;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&prefix) || name.ends_with(".part") {
            continue;
        }
        let size = entry
            .metadata()
            .await
            .map(|m| m.len())
            .map_err(|e| download_failed(e.to_string()))?;
        if size > max_bytes {
            return Err(download_failed(format!(
                "audio too large ({:.1} MB)",
                size as f64 / 1024.0 / 1024.0
            )));
        }
        return Ok(entry.path());
    }
    Err(download_failed("downloaded audio file not found"))
}

#[async_trait]
impl AudioSource for YtDlpAudio {
    async fn download(&self, video_id: &str, dir: &Path) -> Result<PathBuf, TranscriptFailure> {
        debug!("Downloading audio for {} into {:?}", video_id, dir);
        let output = self
            .command(video_id, dir)
            .output()
            .await
            .map_err(|e| download_failed(format!("failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp audio download failed for {}: {}", video_id, stderr.trim());
            return Err(download_failed(format!("yt-dlp failed: {}", stderr.trim())));
        }
        find_download(dir, video_id, self.max_bytes).await
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Client for `POST <base>/audio/transcriptions`.
pub struct OpenAiTranscriber {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn parse_transcription(body: &str) -> Result<TranscriptText, TranscriptFailure> {
    let parsed: TranscriptionResponse = serde_json::from_str(body)
        .map_err(|e| transcription_failed(format!("invalid response: {}", e)))?;
    Ok(TranscriptText {
        text: parsed.text.trim().to_string(),
        language: parsed.language,
    })
}

#[async_trait]
impl SpeechToText for OpenAiTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<TranscriptText, TranscriptFailure> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| transcription_failed(format!("reading {}: {}", audio.display(), e)))?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| transcription_failed(e.to_string()))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let url = format!("{}/audio/transcriptions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transcription_failed(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(transcription_failed(format!("HTTP {}: {}", status, body)));
        }
        parse_transcription(&body)
    }
}

pub struct AudioTranscriptionStrategy {
    source: Arc<dyn AudioSource>,
    speech: Arc<dyn SpeechToText>,
}

impl AudioTranscriptionStrategy {
    pub fn new(source: Arc<dyn AudioSource>, speech: Arc<dyn SpeechToText>) -> Self {
        Self { source, speech }
    }
}

#[async_trait]
impl TranscriptStrategy for AudioTranscriptionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AudioTranscription
    }

    async fn fetch(
        &self,
        video_id: &str,
        _prefs: &TranscriptPreferences,
    ) -> Result<TranscriptText, TranscriptFailure> {
        let workdir = tempfile::Builder::new()
            .prefix("tubesift-audio-")
            .tempdir()
            .map_err(|e| download_failed(format!("creating temp dir: {}", e)))?;

        let audio = self.source.download(video_id, workdir.path()).await?;
        info!("Transcribing audio for {}", video_id);
        self.speech.transcribe(&audio).await
    }
}
