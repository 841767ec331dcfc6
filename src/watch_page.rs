//! Watch page parsing.
//!
//! The watch page embeds two JSON blobs assigned in inline scripts:
//! `ytInitialPlayerResponse` (video details, microformat, caption tracks) and
//! `ytInitialData` (rendered page sections, including the view counter).
//! Both the best-effort metadata provider and the caption strategies read
//! them from here.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;

use crate::http_client::{Fetch, FetchError, FetchedPage};
use crate::models::watch_url;

static SCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

const PLAYER_RESPONSE: &str = "ytInitialPlayerResponse";
const INITIAL_DATA: &str = "ytInitialData";

/// Playability verdict reported by the player response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playability {
    pub status: String,
    pub reason: Option<String>,
}

impl Playability {
    pub fn from_player_response(player: &Value) -> Option<Self> {
        let ps = player.get("playabilityStatus")?;
        let status = ps.get("status")?.as_str()?.to_string();
        let reason = ps
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                ps.pointer("/errorScreen/playerErrorMessageRenderer/reason/simpleText")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        Some(Self { status, reason })
    }

    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }

    /// The player asks for a sign-in to prove the client is not a bot.
    pub fn is_bot_check(&self) -> bool {
        self.status == "LOGIN_REQUIRED"
            && self
                .reason
                .as_deref()
                .is_some_and(|r| r.contains("not a bot"))
    }
}

/// Structured data extracted from one watch page.
#[derive(Debug, Clone, Default)]
pub struct WatchPage {
    pub player_response: Option<Value>,
    pub initial_data: Option<Value>,
    /// A recaptcha interstitial was served instead of the page.
    pub captcha: bool,
    /// The EU consent wall was served instead of the page.
    pub consent_wall: bool,
}

impl WatchPage {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut page = WatchPage {
            captcha: html.contains("g-recaptcha"),
            consent_wall: html.contains("action=\"https://consent.youtube.com/s\""),
            ..Default::default()
        };

        for script in document.select(&SCRIPT) {
            let text: String = script.text().collect();
            if page.player_response.is_none() && text.contains(PLAYER_RESPONSE) {
                page.player_response = extract_assigned_json(&text, PLAYER_RESPONSE);
            }
            if page.initial_data.is_none() && text.contains(INITIAL_DATA) {
                page.initial_data = extract_assigned_json(&text, INITIAL_DATA);
            }
        }
        page
    }

    pub fn playability(&self) -> Option<Playability> {
        self.player_response
            .as_ref()
            .and_then(Playability::from_player_response)
    }

    /// `captions.playerCaptionsTracklistRenderer` from the player response.
    pub fn caption_renderer(&self) -> Option<&Value> {
        self.player_response
            .as_ref()?
            .pointer("/captions/playerCaptionsTracklistRenderer")
    }
}

/// Find `<marker> = {...}` (or `window["<marker>"] = {...}`) in a script and
/// parse the object literal. Trailing script text after the object is ignored.
pub fn extract_assigned_json(script: &str, marker: &str) -> Option<Value> {
    let mut search_from = 0;
    while let Some(found) = script[search_from..].find(marker) {
        let after = search_from + found + marker.len();
        search_from = after;

        let rest = script[after..].trim_start_matches(['"', '\'', ']', ' ', '\t']);
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        if !rest.starts_with('{') {
            continue;
        }
        let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        if let Some(Ok(value)) = values.next() {
            return Some(value);
        }
    }
    None
}

/// Fetch and parse the watch page for a video.
pub async fn fetch_watch_page(
    fetch: &dyn Fetch,
    video_id: &str,
) -> Result<(FetchedPage, WatchPage), FetchError> {
    let url = format!("{}&hl=en&persist_hl=1", watch_url(video_id));
    let response = fetch.get(&url).await?;
    let parsed = if response.is_success() {
        WatchPage::parse(&response.body)
    } else {
        WatchPage::default()
    };
    Ok((response, parsed))
}


#[cfg(test)]
mod tests {
    use super::fixtures::watch_html;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_assigned_json_ignores_trailing_script() {
        let script = r#"if (window.ytInitialPlayerResponse) {} var ytInitialPlayerResponse = {"a": {"b": "};"}};var x = 1;"#;
        let value = extract_assigned_json(script, "ytInitialPlayerResponse").unwrap();
        assert_eq!(value["a"]["b"], "};");
    }

    #[test]
    fn test_extract_window_bracket_form() {
        let script = r#"window["ytInitialData"] = {"k": 1};"#;
        assert_eq!(extract_assigned_json(script, "ytInitialData").unwrap()["k"], 1);
    }

    #[test]
    fn test_parse_watch_page() {
        let player = json!({"playabilityStatus": {"status": "OK"}, "videoDetails": {"videoId": "abcdefghijk"}});
        let data = json!({"contents": {}});
        let page = WatchPage::parse(&watch_html(&player, Some(&data)));
        assert_eq!(page.player_response.unwrap()["videoDetails"]["videoId"], "abcdefghijk");
        assert!(page.initial_data.is_some());
        assert!(!page.captcha);
    }

    #[test]
    fn test_playability_bot_check() {
        let player = json!({"playabilityStatus": {"status": "LOGIN_REQUIRED",
            "reason": "Sign in to confirm you're not a bot"}});
        let playability = Playability::from_player_response(&player).unwrap();
        assert!(!playability.is_ok());
        assert!(playability.is_bot_check());
    }

    #[test]
    fn test_captcha_page() {
        let page = WatchPage::parse("<html><div class=\"g-recaptcha\"></div></html>");
        assert!(page.captcha);
        assert!(page.player_response.is_none());
    }
}
