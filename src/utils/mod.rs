//! Shared utility functions.
//!
//! - `channel_url`: channel reference normalization and listing URL joins
//! - `numbers`: view count and duration parsing
//! - `text`: entity decoding and caption text cleanup

pub mod channel_url;
pub mod numbers;
pub mod text;

pub use channel_url::{channel_key, join_tab, normalize_channel_url, ChannelKey};
pub use numbers::{
    parse_clock_duration, parse_iso8601_duration, parse_view_count, parse_view_count_detailed,
    ParsedCount,
};
