//! Adaptive per-host request spacing.
//!
//! Backs off when a host answers 429/503 and recovers gradually on success.
//! The limiter only delays requests; it never replays them. Quota-limited
//! endpoints must see each throttle response exactly once.

mod host_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use host_state::HostState;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Base spacing between requests to the same host.
    pub base_delay: Duration,
    pub min_delay: Duration,
    /// Ceiling for backoff.
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Applied on recovery (< 1.0).
    pub recovery_multiplier: f64,
    /// Consecutive successes before the delay is reduced.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.8,
            recovery_threshold: 5,
        }
    }
}

/// Snapshot of one host's limiter state.
#[derive(Debug, Clone)]
pub struct HostStats {
    pub current_delay: Duration,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub throttle_hits: u64,
}

/// Rate limiter shared by every client in a run. Clones share state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    hosts: Arc<RwLock<HashMap<String, HostState>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            hosts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn extract_host(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait until the host is ready, then record the request start.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let host = Self::extract_host(url)?;

        let wait = {
            let hosts = self.hosts.read().await;
            hosts
                .get(&host)
                .map(|s| s.time_until_ready())
                .unwrap_or(Duration::ZERO)
        };
        if wait > Duration::ZERO {
            debug!("Spacing requests to {}: waiting {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }

        let mut hosts = self.hosts.write().await;
        let state = hosts
            .entry(host.clone())
            .or_insert_with(|| HostState::new(self.config.base_delay));
        state.last_request = Some(Instant::now());
        state.total_requests += 1;

        Some(host)
    }

    /// Feed a response status back into the host's state.
    pub async fn report_status(&self, host: &str, status: u16) {
        match status {
            429 | 503 => self.report_throttle(host, status).await,
            500..=599 => self.report_server_error(host).await,
            200..=399 => self.report_success(host).await,
            _ => {}
        }
    }

    pub async fn report_success(&self, host: &str) {
        let mut hosts = self.hosts.write().await;
        let Some(state) = hosts.get_mut(host) else {
            return;
        };
        state.consecutive_successes += 1;
        if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
            state.scale_delay(
                self.config.recovery_multiplier,
                self.config.min_delay,
                self.config.max_delay,
            );
            if state.current_delay <= self.config.base_delay {
                state.in_backoff = false;
                state.current_delay = self.config.base_delay;
                info!("{} recovered from throttling backoff", host);
            } else {
                debug!("{} delay reduced to {:?}", host, state.current_delay);
            }
            state.consecutive_successes = 0;
        }
    }

    pub async fn report_throttle(&self, host: &str, status: u16) {
        let mut hosts = self.hosts.write().await;
        let Some(state) = hosts.get_mut(host) else {
            return;
        };
        state.throttle_hits += 1;
        state.consecutive_successes = 0;
        state.in_backoff = true;
        state.scale_delay(
            self.config.backoff_multiplier,
            self.config.min_delay,
            self.config.max_delay,
        );
        warn!(
            "Throttled by {} (HTTP {}), spacing requests {:?} apart",
            host, status, state.current_delay
        );
    }

    pub async fn report_server_error(&self, host: &str) {
        let mut hosts = self.hosts.write().await;
        if let Some(state) = hosts.get_mut(host) {
            state.scale_delay(1.5, self.config.min_delay, self.config.max_delay);
            debug!("Server error from {}, delay now {:?}", host, state.current_delay);
        }
    }

    pub async fn stats(&self) -> HashMap<String, HostStats> {
        let hosts = self.hosts.read().await;
        hosts
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    HostStats {
                        current_delay: v.current_delay,
                        in_backoff: v.in_backoff,
                        total_requests: v.total_requests,
                        throttle_hits: v.throttle_hits,
                    },
                )
            })
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> RateLimitConfig {
        RateLimitConfig {
            base_delay: Duration::from_millis(1),
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(50),
            recovery_threshold: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(
            RateLimiter::extract_host("https://www.youtube.com/watch?v=x"),
            Some("www.youtube.com".to_string())
        );
        assert_eq!(RateLimiter::extract_host("not a url"), None);
    }

    #[tokio::test]
    async fn test_backoff_on_throttle() {
        let limiter = RateLimiter::with_config(fast_config());
        limiter.acquire("https://www.googleapis.com/a").await;
        limiter.report_status("www.googleapis.com", 429).await;

        let stats = limiter.stats().await;
        let host = &stats["www.googleapis.com"];
        assert!(host.in_backoff);
        assert_eq!(host.throttle_hits, 1);
        assert!(host.current_delay >= Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_recovers_after_successes() {
        let limiter = RateLimiter::with_config(fast_config());
        limiter.acquire("https://example.com/").await;
        limiter.report_status("example.com", 503).await;
        for _ in 0..20 {
            limiter.report_status("example.com", 200).await;
        }
        let stats = limiter.stats().await;
        assert!(!stats["example.com"].in_backoff);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let limiter = RateLimiter::with_config(fast_config());
        let clone = limiter.clone();
        clone.acquire("https://example.com/").await;
        assert_eq!(limiter.stats().await["example.com"].total_requests, 1);
    }
}
