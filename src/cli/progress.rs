//! Terminal progress for a scrape run.

use indicatif::{ProgressBar, ProgressStyle};

const SCAN_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";
const TRANSCRIPT_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

/// A single bar: a spinner while scanning, then a transcript progress bar.
#[derive(Clone)]
pub struct ScanProgress {
    bar: ProgressBar,
    transcript_style: ProgressStyle,
}

impl ScanProgress {
    pub fn new(enabled: bool) -> anyhow::Result<Self> {
        let bar = if enabled {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(ProgressStyle::default_spinner().template(SCAN_TEMPLATE)?);
        bar.enable_steady_tick(std::time::Duration::from_millis(120));

        let transcript_style = ProgressStyle::default_bar()
            .template(TRANSCRIPT_TEMPLATE)?
            .progress_chars("#>-");
        Ok(Self {
            bar,
            transcript_style,
        })
    }

    pub fn scanning(&self, scanned: usize, kept: usize) {
        self.bar
            .set_message(format!("Scanned {} videos, {} kept", scanned, kept));
    }

    pub fn start_transcripts(&self, total: usize) {
        self.bar.set_style(self.transcript_style.clone());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_message("Fetching transcripts...");
    }

    pub fn transcript_done(&self) {
        self.bar.inc(1);
    }

    pub fn println(&self, msg: &str) {
        if self.bar.is_hidden() {
            eprintln!("{}", msg);
        } else {
            self.bar.println(msg);
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
