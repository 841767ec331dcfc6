//! Caption track lists from player responses, and track selection.

use serde_json::Value;

use super::watch_page::CaptionFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub name: Option<String>,
    pub base_url: String,
    /// Automatic speech recognition track.
    pub generated: bool,
}

/// Read the tracks under `captions.playerCaptionsTracklistRenderer`.
///
/// Accepts both the current layout (`name.runs`) and the older
/// `name.simpleText`; ASR tracks are recognized by `kind: "asr"` or an
/// `a.` prefixed `vssId`.
pub fn parse_caption_tracks(renderer: Option<&Value>) -> Result<Vec<CaptionTrack>, CaptionFailure> {
    let renderer = renderer.ok_or(CaptionFailure::NoCaptionRenderer)?;
    let raw_tracks = match renderer.get("captionTracks") {
        None | Some(Value::Null) => return Err(CaptionFailure::NoTracks),
        Some(Value::Array(tracks)) if tracks.is_empty() => return Err(CaptionFailure::NoTracks),
        Some(Value::Array(tracks)) => tracks,
        Some(other) => {
            return Err(CaptionFailure::UnknownTrackLayout(format!(
                "captionTracks is {}",
                json_kind(other)
            )))
        }
    };

    raw_tracks.iter().map(parse_track).collect()
}

fn parse_track(raw: &Value) -> Result<CaptionTrack, CaptionFailure> {
    let base_url = raw["baseUrl"]
        .as_str()
        .or_else(|| raw["url"].as_str())
        .ok_or_else(|| CaptionFailure::UnknownTrackLayout("track without baseUrl".into()))?;
    let language_code = raw["languageCode"]
        .as_str()
        .ok_or_else(|| CaptionFailure::UnknownTrackLayout("track without languageCode".into()))?;
    let name = raw["name"]["simpleText"]
        .as_str()
        .or_else(|| raw["name"]["runs"][0]["text"].as_str())
        .map(str::to_string);
    let generated = raw["kind"].as_str() == Some("asr")
        || raw["vssId"].as_str().is_some_and(|v| v.starts_with("a."));

    Ok(CaptionTrack {
        language_code: language_code.to_string(),
        name,
        base_url: base_url.replace("&fmt=srv3", ""),
        generated,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn language_matches(track: &str, wanted: &str, exact: bool) -> bool {
    let track = track.to_ascii_lowercase();
    let wanted = wanted.to_ascii_lowercase();
    if exact {
        return track == wanted;
    }
    track.starts_with(&format!("{}-", wanted)) || wanted.starts_with(&format!("{}-", track))
}

/// Pick a track: each requested language in order (exact, then prefix),
/// manual before generated at every step; otherwise English; otherwise the
/// first usable track.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    languages: &[String],
    allow_generated: bool,
) -> Result<&'a CaptionTrack, CaptionFailure> {
    let usable: Vec<&CaptionTrack> = tracks
        .iter()
        .filter(|t| allow_generated || !t.generated)
        .collect();

    let find = |wanted: &str| -> Option<&'a CaptionTrack> {
        for exact in [true, false] {
            for generated in [false, true] {
                if let Some(track) = usable.iter().find(|t| {
                    t.generated == generated && language_matches(&t.language_code, wanted, exact)
                }) {
                    return Some(*track);
                }
            }
        }
        None
    };

    languages
        .iter()
        .find_map(|lang| find(lang.as_str()))
        .or_else(|| find("en"))
        .or_else(|| usable.iter().find(|t| !t.generated).copied())
        .or_else(|| usable.first().copied())
        .ok_or_else(|| CaptionFailure::NoMatchingTrack {
            available: tracks.iter().map(|t| t.language_code.clone()).collect(),
        })
}
