use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::MediaSource;
use crate::media::CandidateRef;
use crate::utils::run_tool;
use crate::{MashupError, Result};

/// Format selector used when ffmpeg will post-process the download
pub const BEST_AUDIO: &str = "bestaudio/best";

/// Format selector for the built-in decoder, which cannot read Opus
pub const DECODABLE_AUDIO: &str = "bestaudio[ext=m4a]/bestaudio[ext=mp3]/bestaudio/best";

/// YouTube audio download using yt-dlp
pub struct YoutubeSource {
    yt_dlp_path: PathBuf,
    timeout: Duration,
    format: String,
}

impl YoutubeSource {
    pub fn new(yt_dlp_path: PathBuf, timeout: Duration) -> Self {
        Self {
            yt_dlp_path,
            timeout,
            format: BEST_AUDIO.to_string(),
        }
    }

    /// Override the yt-dlp `--format` selector
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn watch_url(video_id: &str) -> Result<Url> {
        Url::parse_with_params("https://www.youtube.com/watch", &[("v", video_id)])
            .map_err(|e| MashupError::InvalidRequest(format!("bad video id {video_id}: {e}")))
    }

    fn output_template(stem: &Path) -> String {
        format!("{}.%(ext)s", stem.display())
    }
}

#[async_trait]
impl MediaSource for YoutubeSource {
    async fn download(&self, candidate: &CandidateRef, stem: &Path) -> Result<()> {
        let url = Self::watch_url(&candidate.source_id)?;
        tracing::debug!("Downloading audio for: {}", url);

        run_tool(
            &self.yt_dlp_path,
            [
                "--format",
                self.format.as_str(),
                "--output",
                &Self::output_template(stem),
                "--no-playlist",
                "--no-part",
                "--no-progress",
                "--quiet",
                "--no-warnings",
                url.as_str(),
            ],
            self.timeout,
        )
        .await?;

        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_url_encodes_id() {
        let url = YoutubeSource::watch_url("dQw4w9WgXcQ").unwrap();
        assert_eq!(url.as_str(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");

        let odd = YoutubeSource::watch_url("a&b").unwrap();
        assert_eq!(odd.as_str(), "https://www.youtube.com/watch?v=a%26b");
    }

    #[test]
    fn output_template_lets_yt_dlp_pick_extension() {
        assert_eq!(
            YoutubeSource::output_template(Path::new("/work/temp_video_4")),
            "/work/temp_video_4.%(ext)s"
        );
    }

    #[test]
    fn default_format_is_best_audio() {
        let source = YoutubeSource::new(PathBuf::from("yt-dlp"), Duration::from_secs(1));
        assert_eq!(source.format, BEST_AUDIO);

        let source = source.with_format(DECODABLE_AUDIO);
        assert_eq!(source.format, DECODABLE_AUDIO);
    }
}
