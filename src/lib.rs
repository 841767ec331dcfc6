//! tubesift - rank a YouTube channel's uploads by views.
//!
//! Enumerates a channel's videos, fetches per-video metadata, keeps the ones
//! above a view threshold and resolves transcripts for them through a chain
//! of fallback strategies. The result is a ranked set of rows ready for CSV.

pub mod cli;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod http_client;
pub mod metadata;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod ranking;
pub mod rate_limiter;
pub mod transcript;
pub mod utils;
pub mod watch_page;
pub mod youtube_api;
