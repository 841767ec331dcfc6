//! User agent selection.
//!
//! Watch pages only embed the player response for browser-like clients, so
//! the default is a desktop browser string rather than a tool identifier.

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Identifies the tool honestly. Used for the data API, which does not care.
pub const TOOL_USER_AGENT: &str = concat!("tubesift/", env!("CARGO_PKG_VERSION"));

/// Browser user agents rotated by `rotate` mode.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

fn random_browser_user_agent() -> &'static str {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0);
    BROWSER_USER_AGENTS[nanos % BROWSER_USER_AGENTS.len()]
}

/// Resolve the configured user agent.
/// - None => desktop Chrome
/// - "rotate" => one of [`BROWSER_USER_AGENTS`], picked per client
/// - "tool" => [`TOOL_USER_AGENT`]
/// - other => used verbatim
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => DEFAULT_USER_AGENT.to_string(),
        Some("rotate") => random_browser_user_agent().to_string(),
        Some("tool") => TOOL_USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}
