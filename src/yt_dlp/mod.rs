//! `yt-dlp` subprocess adapter: video search and audio extraction.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr, eyre};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};

use crate::config::Config;

mod download;
mod search;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct YtDlp {
    program: PathBuf,
    search_results: u32,
    audio_format: String,
    /// Shared by clones.
    rate_limiter: Arc<DirectRateLimiter>,
}

impl YtDlp {
    /// Find `yt-dlp` on the PATH and set up the search rate limit.
    pub fn locate(config: &Config) -> Result<Self> {
        let program = which::which("yt-dlp").wrap_err(
            "yt-dlp not found in PATH. Please install yt-dlp and ensure it's available.",
        )?;
        tracing::debug!("Using yt-dlp at {}", program.display());

        let searches_per_minute = NonZeroU32::new(config.download.searches_per_minute)
            .ok_or_else(|| eyre!("searches_per_minute must be greater than 0"))?;
        tracing::debug!(
            "Rate limiter configured: {} searches per minute",
            searches_per_minute
        );

        Ok(Self {
            program,
            search_results: config.download.search_results.max(1),
            audio_format: config.download.audio_format.clone(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(searches_per_minute))),
        })
    }
}
