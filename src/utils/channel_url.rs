//! Channel reference normalization.
//!
//! Every listing URL the enumerator requests is derived from the canonical
//! base produced here. A malformed base silently yields an empty listing, so
//! all string handling for channel references lives in this module.

use url::Url;

use crate::error::EnumerationError;

/// Host every canonical base is rewritten to.
pub const CANONICAL_HOST: &str = "www.youtube.com";

/// Channel tab suffixes stripped from the end of a path.
const TAB_SUFFIXES: &[&str] = &[
    "videos",
    "shorts",
    "streams",
    "featured",
    "playlists",
    "community",
    "about",
    "live",
    "podcasts",
    "releases",
];

/// First path segments that identify a non-channel page.
const NON_CHANNEL_SEGMENTS: &[&str] = &[
    "watch", "embed", "playlist", "results", "feed", "shorts", "live", "v", "redirect",
];

/// Normalize a caller-supplied channel reference into its canonical base URL.
///
/// Accepts full or scheme-less URLs, bare `@handle`s, `/channel/<id>`,
/// `/c/<name>` and `/user/<name>` paths. Query strings, fragments and any
/// trailing tab suffixes are removed. The result is idempotent under this
/// function.
pub fn normalize_channel_url(input: &str) -> Result<String, EnumerationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EnumerationError::unresolvable(input, "empty channel reference"));
    }

    let candidate = if trimmed.starts_with('@') {
        format!("https://{}/{}", CANONICAL_HOST, trimmed)
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    let parsed = Url::parse(&candidate)
        .map_err(|e| EnumerationError::unresolvable(input, format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(EnumerationError::unresolvable(
                input,
                format!("unsupported scheme {}", other),
            ))
        }
    }

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if !is_youtube_host(&host) {
        return Err(EnumerationError::unresolvable(
            input,
            format!("{} is not a YouTube host", host),
        ));
    }

    let path = strip_tab_suffixes(parsed.path());
    if path.is_empty() {
        return Err(EnumerationError::unresolvable(input, "no channel path"));
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let first = segments[0].to_ascii_lowercase();
    if NON_CHANNEL_SEGMENTS.contains(&first.as_str()) {
        return Err(EnumerationError::unresolvable(
            input,
            format!("/{} pages are not channels", segments[0]),
        ));
    }
    if matches!(first.as_str(), "channel" | "c" | "user")
        && segments.get(1).map_or(true, |s| s.is_empty())
    {
        return Err(EnumerationError::unresolvable(input, "missing channel name"));
    }

    Ok(format!("https://{}{}", CANONICAL_HOST, path))
}

fn is_youtube_host(host: &str) -> bool {
    matches!(host, "youtube.com" | "www.youtube.com" | "m.youtube.com")
}

/// Remove trailing slashes and known tab suffixes, repeatedly and
/// case-insensitively.
fn strip_tab_suffixes(path: &str) -> String {
    let mut path = path.trim_end_matches('/').to_string();
    loop {
        let Some(idx) = path.rfind('/') else {
            break;
        };
        let last = &path[idx + 1..];
        // Never strip the channel name itself, e.g. `/@videos`.
        if idx == 0 {
            break;
        }
        if TAB_SUFFIXES.iter().any(|tab| last.eq_ignore_ascii_case(tab)) {
            path.truncate(idx);
            path = path.trim_end_matches('/').to_string();
        } else {
            break;
        }
    }
    path
}

/// Append a tab path (with optional query) to a canonical base.
pub fn join_tab(base: &str, tab_and_query: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        tab_and_query.trim_start_matches('/')
    )
}

/// How a canonical base identifies its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKey {
    /// `@handle`, stored without the `@`.
    Handle(String),
    /// `UC…` channel ID.
    Id(String),
    /// Legacy `/c/<name>`, `/user/<name>` or bare `/<name>` URL.
    Legacy(String),
}

/// Identify the channel a canonical base refers to.
pub fn channel_key(base: &str) -> Option<ChannelKey> {
    let parsed = Url::parse(base).ok()?;
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
    let first = segments.next()?;

    if let Some(handle) = first.strip_prefix('@') {
        let handle = urlencoding::decode(handle).ok()?.into_owned();
        return (!handle.is_empty()).then_some(ChannelKey::Handle(handle));
    }
    match first {
        "channel" => segments.next().map(|id| ChannelKey::Id(id.to_string())),
        "c" | "user" => segments.next().map(|n| ChannelKey::Legacy(n.to_string())),
        other => Some(ChannelKey::Legacy(other.to_string())),
    }
}
