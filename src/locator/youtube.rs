use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::{DiscoveryProvider, SearchEntry};
use crate::utils::run_tool;
use crate::{MashupError, Result};

/// YouTube search using yt-dlp's `ytsearch` pseudo-URL
pub struct YoutubeSearch {
    yt_dlp_path: PathBuf,
    timeout: Duration,
}

/// The part of yt-dlp's flat-playlist JSON we read
#[derive(Debug, Deserialize)]
struct SearchPayload {
    entries: Option<Vec<Option<SearchEntry>>>,
}

impl YoutubeSearch {
    pub fn new(yt_dlp_path: PathBuf, timeout: Duration) -> Self {
        Self {
            yt_dlp_path,
            timeout,
        }
    }

    fn search_url(query: &str, count: usize) -> String {
        format!("ytsearch{}:{}", count, query)
    }

    fn parse_entries(stdout: &[u8]) -> Result<Vec<Option<SearchEntry>>> {
        let payload: SearchPayload = serde_json::from_slice(stdout)
            .map_err(|e| MashupError::Discovery(format!("unreadable yt-dlp output: {e}")))?;

        payload
            .entries
            .ok_or_else(|| MashupError::Discovery("search returned no entries".to_string()))
    }
}

#[async_trait]
impl DiscoveryProvider for YoutubeSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<Option<SearchEntry>>> {
        tracing::debug!("Searching YouTube for: {}", query);

        let output = run_tool(
            &self.yt_dlp_path,
            [
                "--flat-playlist",
                "--dump-single-json",
                "--no-warnings",
                &Self::search_url(query, count),
            ],
            self.timeout,
        )
        .await?;

        Self::parse_entries(&output.stdout)
    }

    fn provider_name(&self) -> &'static str {
        "YouTube"
    }
}
