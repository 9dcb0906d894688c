use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::Result;

/// A discovered media item, before anything exists locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRef {
    /// Provider-specific identifier (a YouTube video id)
    pub source_id: String,

    /// Title reported by the provider
    pub title: String,

    /// Position in the discovery response; carried through every stage
    pub ordinal: usize,
}

/// Which stage produced a [`MediaFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaStage {
    Fetched,
    Transcoded,
    Trimmed,
}

/// A local file produced by one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub stage: MediaStage,
    pub ordinal: usize,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, stage: MediaStage, ordinal: usize) -> Self {
        Self {
            path: path.into(),
            stage,
            ordinal,
        }
    }

    /// The file that replaces this one after the next stage, keeping the ordinal
    pub fn advance(&self, path: impl Into<PathBuf>, stage: MediaStage) -> Self {
        Self::new(path, stage, self.ordinal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Locate,
    Fetch,
    Transcode,
    Trim,
    Concatenate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Locate => "locate",
            Stage::Fetch => "fetch",
            Stage::Transcode => "transcode",
            Stage::Trim => "trim",
            Stage::Concatenate => "concatenate",
        }
    }

    /// User-facing message shown when this stage ends with nothing left
    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::Locate => "No videos found",
            Stage::Fetch => "Download failed",
            Stage::Transcode => "Conversion failed",
            Stage::Trim => "Trimming failed",
            Stage::Concatenate => "Failed to merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item that a stage gave up on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedItem {
    pub ordinal: usize,
    pub reason: String,
}

/// Outcome of running one stage over its whole input list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,

    /// Files that made it through, in input order
    pub survivors: Vec<MediaFile>,

    /// Items that failed, with the reason
    pub dropped: Vec<DroppedItem>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            survivors: Vec::new(),
            dropped: Vec::new(),
        }
    }

    /// Fold one per-item result into the report
    pub fn record(&mut self, ordinal: usize, result: Result<MediaFile>) {
        match result {
            Ok(file) => {
                tracing::debug!("{} #{} -> {}", self.stage, ordinal, file.path.display());
                self.survivors.push(file);
            }
            Err(e) => {
                tracing::warn!("{} #{} dropped: {}", self.stage, ordinal, e);
                self.dropped.push(DroppedItem {
                    ordinal,
                    reason: e.to_string(),
                });
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.survivors.is_empty()
    }

    pub fn total(&self) -> usize {
        self.survivors.len() + self.dropped.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} succeeded",
            self.stage,
            self.survivors.len(),
            self.total()
        )
    }
}

/// Number of items alive after each stage of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub located: usize,
    pub fetched: usize,
    pub transcoded: usize,
    pub trimmed: usize,
}

/// Terminal artifact of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Where the merged file was (or would have been) written
    pub output_path: PathBuf,

    /// Whether the merged file exists
    pub success: bool,

    /// Survivor counts per stage
    pub counts: StageCounts,

    /// Name of the audio backend that did the work
    pub backend: String,

    /// Timestamp when the run finished
    pub completed_at: chrono::DateTime<chrono::Utc>,
}
