//! In-memory [`Fetch`] implementation serving pre-recorded responses.
//!
//! Routes match when their pattern is a substring of the requested URL; the
//! first matching route wins. A route with several responses serves them in
//! order and then keeps repeating the last one. Unrouted URLs get a 404.
//!
//! Built for unit tests and, behind the `testing` feature, integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Fetch, FetchError, FetchedPage};

struct Route {
    pattern: String,
    responses: VecDeque<Result<FetchedPage, FetchError>>,
}

#[derive(Default)]
pub struct CannedFetch {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<String>>,
}

impl CannedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, pattern: &str, status: u16, body: impl Into<String>) -> Self {
        self.route_sequence(pattern, vec![Ok(FetchedPage::new(status, body))])
    }

    pub fn route_error(self, pattern: &str, error: FetchError) -> Self {
        self.route_sequence(pattern, vec![Err(error)])
    }

    pub fn route_sequence(
        self,
        pattern: &str,
        responses: Vec<Result<FetchedPage, FetchError>>,
    ) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(Route {
                pattern: pattern.to_string(),
                responses: responses.into(),
            });
        }
        self
    }

    /// Every request served so far, as `GET <url>` / `POST <url>`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests whose URL contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.contains(pattern))
            .count()
    }

    fn serve(&self, method: &str, url: &str) -> Result<FetchedPage, FetchError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(format!("{} {}", method, url));
        }
        let Ok(mut routes) = self.routes.lock() else {
            return Ok(FetchedPage::new(500, "poisoned"));
        };
        let Some(route) = routes.iter_mut().find(|r| url.contains(&r.pattern)) else {
            return Ok(FetchedPage::new(404, ""));
        };
        if route.responses.len() > 1 {
            route
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(FetchedPage::new(404, "")))
        } else {
            route
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(FetchedPage::new(404, "")))
        }
    }
}

#[async_trait]
impl Fetch for CannedFetch {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.serve("GET", url)
    }

    async fn post_json(
        &self,
        url: &str,
        _body: &serde_json::Value,
    ) -> Result<FetchedPage, FetchError> {
        self.serve("POST", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_then_repeat_last() {
        let fetch = CannedFetch::new().route_sequence(
            "/a",
            vec![Ok(FetchedPage::new(200, "one")), Ok(FetchedPage::new(200, "two"))],
        );
        assert_eq!(fetch.get("https://x/a").await.unwrap().body, "one");
        assert_eq!(fetch.get("https://x/a").await.unwrap().body, "two");
        assert_eq!(fetch.get("https://x/a").await.unwrap().body, "two");
        assert_eq!(fetch.get("https://x/b").await.unwrap().status, 404);
        assert_eq!(fetch.count("/a"), 3);
    }
}
