use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod youtube;

use crate::media::{CandidateRef, MediaFile, MediaStage, Stage, StageReport};
use crate::workspace::Workspace;
use crate::{MashupError, Result};

/// Extensions probed, in order, after a download finishes
const KNOWN_EXTENSIONS: &[&str] = &["webm", "m4a", "mp4", "opus", "mp3"];

/// Something that can download the audio of a candidate
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Download the best available audio of `candidate`
    ///
    /// `stem` is the output path without an extension; the source picks the
    /// extension that matches what it downloaded.
    async fn download(&self, candidate: &CandidateRef, stem: &Path) -> Result<()>;

    /// Get the name of this source
    fn source_name(&self) -> &'static str;
}

/// Downloads every candidate, one at a time, keeping the ones that work
pub struct Fetcher {
    source: Arc<dyn MediaSource>,
    workspace: Workspace,
    delay: Duration,
}

impl Fetcher {
    pub fn new(source: Arc<dyn MediaSource>, workspace: Workspace, delay: Duration) -> Self {
        Self {
            source,
            workspace,
            delay,
        }
    }

    /// Output path without extension for a candidate
    pub fn stem_for(&self, ordinal: usize) -> PathBuf {
        self.workspace.path_for(&format!("video_{}", ordinal))
    }

    pub async fn fetch(&self, candidates: &[CandidateRef]) -> StageReport {
        let mut report = StageReport::new(Stage::Fetch);
        let total = candidates.len();

        for (index, candidate) in candidates.iter().enumerate() {
            // Throttle between requests to the remote provider
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            tracing::info!(
                "Downloading video {}/{}: {}",
                index + 1,
                total,
                candidate.title
            );
            let result = self.fetch_one(candidate).await;
            report.record(candidate.ordinal, result);
        }

        tracing::info!("{}", report.summary());
        report
    }

    async fn fetch_one(&self, candidate: &CandidateRef) -> Result<MediaFile> {
        let stem = self.stem_for(candidate.ordinal);

        // A retry must overwrite, not sit next to, an earlier attempt
        for stale in matching_files(&stem) {
            tracing::debug!("Removing earlier download: {}", stale.display());
            fs_err::remove_file(&stale)?;
        }

        let result = self.source.download(candidate, &stem).await;

        // Whatever the source left behind belongs to this stage
        for written in matching_files(&stem) {
            self.workspace.track(written);
        }
        result?;

        let path = locate_download(&stem).ok_or_else(|| MashupError::MissingOutput(stem.clone()))?;
        tracing::info!("Downloaded: {} ({})", candidate.title, path.display());

        Ok(MediaFile::new(path, MediaStage::Fetched, candidate.ordinal))
    }
}

/// Find the file a download produced for `stem`
///
/// Known extensions win; otherwise any file named `<stem>` or `<stem>.<ext>`.
pub fn locate_download(stem: &Path) -> Option<PathBuf> {
    for ext in KNOWN_EXTENSIONS {
        let candidate = with_suffix(stem, ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if stem.is_file() {
        return Some(stem.to_path_buf());
    }

    let mut others = matching_files(stem);
    others.sort();
    others.into_iter().next()
}

/// `<stem>.<ext>`; unlike `with_extension` a dot already in the stem is kept
fn with_suffix(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Files named exactly `<stem>` or `<stem>.<anything>`
fn matching_files(stem: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(name)) = (stem.parent(), stem.file_name()) else {
        return Vec::new();
    };
    let name = name.to_string_lossy().into_owned();
    let dotted = format!("{}.", name);
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let Ok(entries) = fs_err::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            file_name == name.as_str() || file_name.starts_with(&dotted)
        })
        .map(|entry| entry.path())
        .collect()
}
