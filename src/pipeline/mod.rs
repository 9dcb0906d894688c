use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

mod concatenator;
mod transcoder;
mod trimmer;

#[cfg(test)]
mod tests;

pub use concatenator::Concatenator;
pub use transcoder::Transcoder;
pub use trimmer::Trimmer;

use crate::backend::Backends;
use crate::config::Config;
use crate::fetcher::youtube::{YoutubeSource, DECODABLE_AUDIO};
use crate::fetcher::{Fetcher, MediaSource};
use crate::locator::youtube::YoutubeSearch;
use crate::locator::MediaLocator;
use crate::media::{MediaFile, PipelineResult, Stage, StageCounts, StageReport};
use crate::utils::ToolPaths;
use crate::workspace::Workspace;
use crate::{MashupError, Result};

/// What to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MashupRequest {
    pub subject: String,

    /// Number of videos to look for
    pub count: usize,

    /// Length of each clip in seconds
    pub clip_seconds: u32,

    /// Where the merged MP3 goes
    pub output: PathBuf,
}

impl MashupRequest {
    /// Minimal checks the pipeline itself relies on
    ///
    /// The stricter user-facing limits live in the CLI.
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(MashupError::InvalidRequest("subject must not be empty".to_string()));
        }
        if self.count == 0 {
            return Err(MashupError::InvalidRequest("count must be greater than zero".to_string()));
        }
        if self.clip_seconds == 0 {
            return Err(MashupError::InvalidRequest(
                "clip duration must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate → fetch → transcode → trim → concatenate, one item at a time
pub struct MashupPipeline {
    locator: MediaLocator,
    fetcher: Fetcher,
    transcoder: Transcoder,
    trimmer: Trimmer,
    concatenator: Concatenator,
    backends: Backends,
    workspace: Workspace,
    quiet: bool,
}

impl MashupPipeline {
    /// Wire the pipeline to yt-dlp and the best available audio backend
    pub fn new(config: &Config, tools: &ToolPaths, quiet: bool) -> anyhow::Result<Self> {
        let yt_dlp = tools
            .yt_dlp
            .clone()
            .ok_or_else(|| MashupError::ToolUnavailable("yt-dlp".to_string()))?;
        let timeout = config.tool_timeout();

        let backends = Backends::detect(tools.ffmpeg.as_deref(), timeout);

        let mut source = YoutubeSource::new(yt_dlp.clone(), timeout);
        if backends.is_native() {
            source = source.with_format(DECODABLE_AUDIO);
        }

        let locator = MediaLocator::new(
            Arc::new(YoutubeSearch::new(yt_dlp, timeout)),
            config.pipeline.search_suffix.clone(),
        );
        let root = config.work_dir().context("Failed to resolve work directory")?;
        let workspace = Workspace::new(root, config.pipeline.temp_prefix.clone());

        let mut pipeline = Self::with_components(
            locator,
            Arc::new(source),
            backends,
            workspace,
            config.fetch_delay(),
        );
        pipeline.quiet = quiet;
        Ok(pipeline)
    }

    /// Assemble a pipeline from explicit parts; progress output is off
    pub fn with_components(
        locator: MediaLocator,
        source: Arc<dyn MediaSource>,
        backends: Backends,
        workspace: Workspace,
        fetch_delay: Duration,
    ) -> Self {
        Self {
            locator,
            fetcher: Fetcher::new(source, workspace.clone(), fetch_delay),
            transcoder: Transcoder::new(backends.primary.clone(), workspace.clone()),
            trimmer: Trimmer::new(backends.primary.clone(), workspace.clone()),
            concatenator: Concatenator::new(backends.clone(), workspace.clone()),
            backends,
            workspace,
            quiet: true,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn backend_name(&self) -> &'static str {
        self.backends.primary.name()
    }

    /// Build one mashup
    ///
    /// Returns `StageExhausted` when a stage is left with nothing; a failed
    /// merge is reported through `PipelineResult::success` instead. Every
    /// transient file is gone when this returns, whatever the outcome, and also
    /// when the future is dropped before completion.
    pub async fn run(&self, request: &MashupRequest) -> Result<PipelineResult> {
        request.validate()?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("mashup", run_id = %run_id, subject = %request.subject);
        self.run_stages(request).instrument(span).await
    }

    async fn run_stages(&self, request: &MashupRequest) -> Result<PipelineResult> {
        let _guard = self.workspace.guard();
        self.workspace.keep(&request.output);
        if let Ok(absolute) = std::path::absolute(&request.output) {
            self.workspace.keep(absolute);
        }

        tracing::info!(
            "Building a mashup of {} videos, {}s each, with the {} backend",
            request.count,
            request.clip_seconds,
            self.backend_name()
        );

        let mut counts = StageCounts::default();

        let progress = self.spinner("Searching for videos...");
        let candidates = self.locator.locate(&request.subject, request.count).await;
        counts.located = candidates.len();
        if candidates.is_empty() {
            progress.abandon_with_message(Stage::Locate.failure_message());
            return Err(MashupError::StageExhausted(Stage::Locate));
        }
        progress.finish_with_message(format!("Found {} videos", candidates.len()));

        let fetched = self
            .stage("Downloading audio...", self.fetcher.fetch(&candidates))
            .await?;
        counts.fetched = fetched.len();

        let transcoded = self
            .stage("Converting to MP3...", self.transcoder.transcode(&fetched))
            .await?;
        counts.transcoded = transcoded.len();

        let trimmed = self
            .stage(
                "Trimming clips...",
                self.trimmer.trim(&transcoded, request.clip_seconds),
            )
            .await?;
        counts.trimmed = trimmed.len();

        let progress = self.spinner("Merging clips...");
        let success = self
            .concatenator
            .concatenate(&trimmed, &request.output)
            .await;
        if success {
            progress.finish_with_message(format!("Merged {} clips", trimmed.len()));
        } else {
            progress.abandon_with_message(Stage::Concatenate.failure_message());
        }

        Ok(PipelineResult {
            output_path: request.output.clone(),
            success,
            counts,
            backend: self.backend_name().to_string(),
            completed_at: chrono::Utc::now(),
        })
    }

    /// Run one per-item stage behind a spinner and stop if nothing survived
    async fn stage<F>(&self, message: &str, work: F) -> Result<Vec<MediaFile>>
    where
        F: Future<Output = StageReport>,
    {
        let progress = self.spinner(message);
        let report = work.await;

        if report.is_exhausted() {
            progress.abandon_with_message(report.stage.failure_message());
            return Err(MashupError::StageExhausted(report.stage));
        }

        progress.finish_with_message(report.summary());
        Ok(report.survivors)
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            progress.set_style(style);
        }
        progress.set_message(message.to_string());
        progress.enable_steady_tick(Duration::from_millis(120));
        progress
    }
}
