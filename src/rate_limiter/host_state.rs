//! Per-host request spacing state.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct HostState {
    /// Current spacing between requests to this host.
    pub current_delay: Duration,
    pub last_request: Option<Instant>,
    /// Successes since the last throttle response.
    pub consecutive_successes: u32,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub throttle_hits: u64,
}

impl HostState {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            last_request: None,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            throttle_hits: 0,
        }
    }

    /// Time until this host may receive another request.
    pub fn time_until_ready(&self) -> Duration {
        match self.last_request {
            Some(last) => self.current_delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Multiply the delay, clamped to `[min, max]`.
    pub fn scale_delay(&mut self, factor: f64, min: Duration, max: Duration) {
        let scaled = Duration::from_secs_f64(self.current_delay.as_secs_f64() * factor);
        self.current_delay = scaled.clamp(min, max);
    }
}
