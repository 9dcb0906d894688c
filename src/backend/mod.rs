//! Audio processing backends
//!
//! Every audio step of the pipeline goes through the [`AudioBackend`] trait.
//! Two implementations exist:
//!
//! - [`FfmpegBackend`]: runs the external `ffmpeg` binary (fast, stream copy
//!   where possible)
//! - [`NativeBackend`]: decodes, resamples and re-encodes in-process, used when
//!   `ffmpeg` is not installed
//!
//! The backend is chosen once, when the pipeline is built, by [`Backends::detect`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod ffmpeg;
mod native;

pub use ffmpeg::{manifest_contents, FfmpegBackend};
pub use native::NativeBackend;

use crate::workspace::Workspace;
use crate::Result;

/// Target sample rate of every normalized clip
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Target channel count of every normalized clip
pub const TARGET_CHANNELS: usize = 2;

/// Extension of every normalized clip
pub const TARGET_EXTENSION: &str = "mp3";

/// Operations the pipeline needs from an audio engine
///
/// Implementations write exactly the `output` path they are given; callers
/// check that it exists afterwards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Convert any audio/video container to MP3
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;

    /// Keep at most the first `seconds` of `input`
    async fn trim(&self, input: &Path, output: &Path, seconds: u32) -> Result<()>;

    /// Join `inputs` in order into `output`
    ///
    /// Any scratch file the backend needs is created through `workspace`.
    async fn concatenate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        workspace: &Workspace,
    ) -> Result<()>;

    /// Get the name of this backend
    fn name(&self) -> &'static str;
}

/// The backend chosen for a run, plus what to try when merging fails
#[derive(Clone)]
pub struct Backends {
    pub primary: Arc<dyn AudioBackend>,

    /// Second attempt for concatenation only
    pub merge_fallback: Option<Arc<dyn AudioBackend>>,
}

impl Backends {
    /// Prefer ffmpeg when it is installed, otherwise run natively
    pub fn detect(ffmpeg: Option<&Path>, timeout: Duration) -> Self {
        match ffmpeg {
            Some(path) => {
                tracing::info!("Using ffmpeg at {}", path.display());
                Self {
                    primary: Arc::new(FfmpegBackend::new(path.to_path_buf(), timeout)),
                    merge_fallback: Some(Arc::new(NativeBackend::new())),
                }
            }
            None => {
                tracing::warn!("ffmpeg not found; using the built-in audio engine");
                Self::native()
            }
        }
    }

    pub fn native() -> Self {
        Self {
            primary: Arc::new(NativeBackend::new()),
            merge_fallback: None,
        }
    }

    pub fn is_native(&self) -> bool {
        self.primary.name() == NativeBackend::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_without_ffmpeg_is_native_only() {
        let backends = Backends::detect(None, Duration::from_secs(1));
        assert!(backends.is_native());
        assert!(backends.merge_fallback.is_none());
    }

    #[test]
    fn detect_with_ffmpeg_keeps_native_merge_fallback() {
        let backends = Backends::detect(Some(Path::new("/usr/bin/ffmpeg")), Duration::from_secs(1));
        assert_eq!(backends.primary.name(), "ffmpeg");
        assert!(!backends.is_native());
        assert_eq!(
            backends.merge_fallback.map(|b| b.name()),
            Some(NativeBackend::NAME)
        );
    }
}
