//! Configuration management for tubesift using the prefer crate.
//!
//! Values resolve as defaults < config file < environment < command line.
//! The file layer is [`Config`]; the resolved values live in [`Settings`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::enumerate::TraversalMode;
use crate::http_client::HttpSettings;
use crate::pipeline::DEFAULT_TRANSCRIPT_CONCURRENCY;
use crate::ranking::RankingConfig;
use crate::transcript::TranscriptSettings;

/// Environment variables checked for the Data API key, in order.
pub const YOUTUBE_API_KEY_VARS: [&str; 2] = ["YT_API_KEY", "YOUTUBE_API_KEY"];
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: TraversalMode,
    pub ranking: RankingConfig,
    pub transcripts: TranscriptSettings,
    pub http: HttpSettings,
    /// YouTube Data API v3 key. Enables authoritative metadata.
    pub youtube_api_key: Option<String>,
    /// Fall back to watch-page metadata when a Data API batch fails in transit.
    pub allow_best_effort_fallback: bool,
    pub transcript_concurrency: usize,
    /// Explicit yt-dlp binary; otherwise looked up on `PATH`.
    pub yt_dlp: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: TraversalMode::default(),
            ranking: RankingConfig::default(),
            transcripts: TranscriptSettings::default(),
            http: HttpSettings::default(),
            youtube_api_key: None,
            allow_best_effort_fallback: false,
            transcript_concurrency: DEFAULT_TRANSCRIPT_CONCURRENCY,
            yt_dlp: None,
            output: None,
        }
    }
}

impl Settings {
    /// Apply API keys from the environment. `lookup` is `std::env::var` in
    /// production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = YOUTUBE_API_KEY_VARS.iter().find_map(|name| non_empty(name)) {
            self.youtube_api_key = Some(key);
        }
        if let Some(key) = non_empty(OPENAI_API_KEY_VAR) {
            self.transcripts.openai_api_key = Some(key);
        }
    }
}

/// Configuration file contents. Every field is optional; unset fields keep
/// the defaults from [`Settings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Option<TraversalMode>,
    pub min_views: Option<u64>,
    pub scan_limit: Option<usize>,
    /// Early-stop streak length; 0 disables early stopping.
    pub streak: Option<usize>,
    /// Maximum rows to keep; 0 means unlimited.
    pub max_results: Option<usize>,

    pub youtube_api_key: Option<String>,
    pub allow_best_effort_fallback: Option<bool>,

    pub caption_api: Option<bool>,
    pub watch_page: Option<bool>,
    pub audio_transcription: Option<bool>,
    pub languages: Option<Vec<String>>,
    pub allow_generated: Option<bool>,
    pub cookie_file: Option<String>,
    pub transcription_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub transcript_concurrency: Option<usize>,

    /// Request timeout in seconds.
    pub request_timeout: Option<u64>,
    pub request_delay_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub yt_dlp: Option<String>,
    pub output: Option<String>,

    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a `tubesift` config file in the standard locations.
    pub async fn load() -> Self {
        match prefer::load("tubesift").await {
            Ok(found) => match found.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Ignoring config file {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path. The format follows the
    /// extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Directory relative paths in the file resolve against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
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

        if let Some(ref key) = self.youtube_api_key {
            settings.youtube_api_key = Some(key.clone());
        }
        if let Some(allow) = self.allow_best_effort_fallback {
            settings.allow_best_effort_fallback = allow;
        }

        let transcripts = &mut settings.transcripts;
        if let Some(enabled) = self.caption_api {
            transcripts.caption_api = enabled;
        }
        if let Some(enabled) = self.watch_page {
            transcripts.watch_page = enabled;
        }
        if let Some(enabled) = self.audio_transcription {
            transcripts.audio_transcription = enabled;
        }
        if let Some(ref languages) = self.languages {
            if !languages.is_empty() {
                transcripts.preferences.languages = languages.clone();
            }
        }
        if let Some(allow) = self.allow_generated {
            transcripts.preferences.allow_generated = allow;
        }
        if let Some(ref cookie_file) = self.cookie_file {
            transcripts.cookie_file = Some(self.resolve_path(cookie_file, base_dir));
        }
        if let Some(ref model) = self.transcription_model {
            transcripts.transcription_model = model.clone();
        }
        if let Some(ref key) = self.openai_api_key {
            transcripts.openai_api_key = Some(key.clone());
        }
        if let Some(ref url) = self.openai_base_url {
            transcripts.openai_base_url = Some(url.clone());
        }
        if let Some(concurrency) = self.transcript_concurrency {
            settings.transcript_concurrency = concurrency.max(1);
        }

        if let Some(timeout) = self.request_timeout {
            settings.http.timeout = Duration::from_secs(timeout);
        }
        if let Some(delay) = self.request_delay_ms {
            settings.http.request_delay = Duration::from_millis(delay);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.http.user_agent = Some(user_agent.clone());
        }
        if let Some(ref yt_dlp) = self.yt_dlp {
            settings.yt_dlp = Some(self.resolve_path(yt_dlp, base_dir));
        }
        if let Some(ref output) = self.output {
            settings.output = Some(self.resolve_path(output, base_dir));
        }
    }
}

/// Load settings from an explicit config path, or from a discovered config
/// file, then apply the environment.
pub async fn load_settings(config_path: Option<&Path>) -> Result<(Settings, Config), String> {
    let config = match config_path {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
            Config::load_from_path(Path::new(&expanded)).await?
        }
        None => Config::load().await,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or(cwd);

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env(|name| std::env::var(name).ok());
    Ok((settings, config))
}
