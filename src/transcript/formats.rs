//! Caption payload formats to plain text.
//!
//! The format is sniffed from the payload itself, since track URLs do not
//! reliably say what they will return.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::utils::text::{html_unescape, join_caption_lines, strip_tags};

/// Known caption payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    Vtt,
    /// `<transcript><text start=".." dur="..">..</text></transcript>`
    Srv1,
    /// `<timedtext format="3"><body><p t=".." d=".."><s>..</s></p>`
    Srv3,
    Ttml,
    Json3,
}

impl CaptionFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vtt => "vtt",
            Self::Srv1 => "srv1",
            Self::Srv3 => "srv3",
            Self::Ttml => "ttml",
            Self::Json3 => "json3",
        }
    }

    pub fn detect(payload: &str) -> Option<Self> {
        let head = payload.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with("WEBVTT") {
            return Some(Self::Vtt);
        }
        if head.starts_with('{') {
            return Some(Self::Json3);
        }
        if head.contains("<tt") && head.contains("ttml") {
            return Some(Self::Ttml);
        }
        if head.contains("<timedtext") {
            return Some(Self::Srv3);
        }
        if head.contains("<transcript") {
            return Some(Self::Srv1);
        }
        None
    }
}

static SRV1_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<text\b[^>]*>(.*?)</text>").unwrap());

static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p\b[^>]*>(.*?)</p>").unwrap());

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br\s*/?>").unwrap());

static VTT_TIMING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2}:)?\d{2}:\d{2}[.,]\d{3}\s+-->").unwrap());

/// Convert a caption payload to plain text.
///
/// Returns an error string when the payload is not a recognized format or
/// cannot be decoded. An empty string is a valid result.
pub fn caption_text(payload: &str) -> Result<String, String> {
    let format =
        CaptionFormat::detect(payload).ok_or_else(|| "unrecognized caption payload".to_string())?;
    match format {
        CaptionFormat::Vtt => Ok(vtt_text(payload)),
        CaptionFormat::Json3 => json3_text(payload),
        CaptionFormat::Srv1 => Ok(xml_cues(&SRV1_TEXT, payload)),
        // Both use <p> elements; srv3 nests words in <s>, TTML in <span>.
        CaptionFormat::Srv3 | CaptionFormat::Ttml => Ok(xml_cues(&PARAGRAPH, payload)),
    }
}

fn xml_cues(pattern: &Regex, payload: &str) -> String {
    join_caption_lines(pattern.captures_iter(payload).map(|caps| {
        let with_spaces = LINE_BREAK.replace_all(&caps[1], " ");
        // Entities are escaped twice in srv1 (`&amp;#39;`), so decode after
        // stripping and then once more.
        html_unescape(&html_unescape(&strip_tags(&with_spaces)))
    }))
}

fn vtt_text(payload: &str) -> String {
    let mut lines = Vec::new();
    let mut in_header = true;
    let mut skipping_block = false;

    for raw in payload.lines() {
        let line = raw.trim();
        if line.is_empty() {
            in_header = false;
            skipping_block = false;
            continue;
        }
        if in_header || skipping_block {
            continue;
        }
        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            skipping_block = true;
            continue;
        }
        if VTT_TIMING.is_match(line) || line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        lines.push(html_unescape(&strip_tags(line)));
    }
    join_caption_lines(lines)
}

fn json3_text(payload: &str) -> Result<String, String> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| format!("invalid json3 payload: {}", e))?;
    let events = value["events"]
        .as_array()
        .ok_or_else(|| "json3 payload has no events".to_string())?;
    let cues = events.iter().filter_map(|event| {
        let segs = event["segs"].as_array()?;
        let text: String = segs.iter().filter_map(|s| s["utf8"].as_str()).collect();
        Some(text.replace('\n', " "))
    });
    Ok(join_caption_lines(cues))
}
