//! Thin client for the YouTube Data API v3.
//!
//! Shared by the uploads-playlist enumerator and the authoritative metadata
//! provider. Every call is a single request: throttle and quota responses
//! are classified and returned, never retried.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::http_client::{Fetch, FetchError};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Maximum IDs per `videos.list` call and items per `playlistItems.list` page.
pub const MAX_PAGE_SIZE: usize = 50;

/// Error reasons the API uses for exhausted or throttled quota.
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

#[derive(Debug, Clone, Error)]
pub enum ApiFailure {
    #[error("quota exceeded ({0})")]
    Quota(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("undecodable response: {0}")]
    Decode(String),
}

#[derive(Clone)]
pub struct DataApiClient {
    fetch: Arc<dyn Fetch>,
    api_key: String,
    base: String,
}

impl DataApiClient {
    pub fn new(fetch: Arc<dyn Fetch>, api_key: impl Into<String>) -> Self {
        Self {
            fetch,
            api_key: api_key.into(),
            base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// GET `<base>/<resource>?<params>&key=<api_key>` and decode the JSON body.
    pub async fn get(&self, resource: &str, params: &[(&str, &str)]) -> Result<Value, ApiFailure> {
        let mut query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        query.push(format!("key={}", urlencoding::encode(&self.api_key)));
        let url = format!("{}/{}?{}", self.base, resource, query.join("&"));

        debug!("Data API {} ({} params)", resource, params.len());
        let page = self.fetch.get(&url).await?;
        let body: Value = serde_json::from_str(&page.body).unwrap_or(Value::Null);

        if page.is_success() {
            if body.is_null() {
                return Err(ApiFailure::Decode(format!("{} returned non-JSON body", resource)));
            }
            return Ok(body);
        }
        Err(classify_error(page.status, &body))
    }
}

/// Map a non-2xx Data API response onto an [`ApiFailure`].
pub fn classify_error(status: u16, body: &Value) -> ApiFailure {
    let error = &body["error"];
    let message = error["message"]
        .as_str()
        .unwrap_or("no error message")
        .to_string();
    let reasons: Vec<&str> = error["errors"]
        .as_array()
        .map(|errs| errs.iter().filter_map(|e| e["reason"].as_str()).collect())
        .unwrap_or_default();

    if status == 429 {
        return ApiFailure::Quota(format!("HTTP 429: {}", message));
    }
    if status == 403 {
        if let Some(reason) = reasons.iter().find(|r| QUOTA_REASONS.contains(*r)) {
            return ApiFailure::Quota(format!("{}: {}", reason, message));
        }
    }
    ApiFailure::Http { status, message }
}

/// Display name for a numeric video category ID. Unknown IDs pass through.
pub fn category_name(id: &str) -> String {
    let name = match id {
        "1" => "Film & Animation",
        "2" => "Autos & Vehicles",
        "10" => "Music",
        "15" => "Pets & Animals",
        "17" => "Sports",
        "19" => "Travel & Events",
        "20" => "Gaming",
        "22" => "People & Blogs",
        "23" => "Comedy",
        "24" => "Entertainment",
        "25" => "News & Politics",
        "26" => "Howto & Style",
        "27" => "Education",
        "28" => "Science & Technology",
        "29" => "Nonprofits & Activism",
        other => other,
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::CannedFetch;
    use serde_json::json;

    fn quota_body(reason: &str) -> Value {
        json!({"error": {"code": 403, "message": "The request cannot be completed",
                         "errors": [{"reason": reason, "domain": "youtube.quota"}]}})
    }

    #[test]
    fn test_quota_reasons_classified() {
        for reason in ["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"] {
            assert!(matches!(
                classify_error(403, &quota_body(reason)),
                ApiFailure::Quota(_)
            ));
        }
        assert!(matches!(classify_error(429, &Value::Null), ApiFailure::Quota(_)));
    }

    #[test]
    fn test_other_403_is_plain_http_error() {
        let failure = classify_error(403, &quota_body("forbidden"));
        assert!(matches!(failure, ApiFailure::Http { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_get_builds_query_and_decodes() {
        let fetch = Arc::new(CannedFetch::new().route("/videos?", 200, r#"{"items":[]}"#));
        let client = DataApiClient::new(fetch.clone(), "k e y").with_base("https://api.test/v3/");
        let body = client.get("videos", &[("id", "a,b")]).await.unwrap();
        assert!(body["items"].as_array().unwrap().is_empty());
        assert_eq!(
            fetch.requests(),
            vec!["GET https://api.test/v3/videos?id=a%2Cb&key=k%20e%20y".to_string()]
        );
    }

    #[test]
    fn test_category_name() {
        assert_eq!(category_name("27"), "Education");
        assert_eq!(category_name("999"), "999");
    }
}
