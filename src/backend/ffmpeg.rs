use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::AudioBackend;
use crate::utils::run_tool;
use crate::workspace::Workspace;
use crate::{MashupError, Result};

/// Audio backend driving the external ffmpeg binary
pub struct FfmpegBackend {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegBackend {
    pub fn new(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            timeout,
        }
    }

    async fn run(&self, args: Vec<OsString>, output: &Path) -> Result<()> {
        run_tool(&self.ffmpeg_path, args, self.timeout).await?;

        if !output.is_file() {
            return Err(MashupError::MissingOutput(output.to_path_buf()));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioBackend for FfmpegBackend {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        tracing::debug!("Converting {} to MP3", input.display());

        let args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-vn".into(), // No video
            "-acodec".into(),
            "libmp3lame".into(),
            "-y".into(), // Overwrite output file
            output.into(),
        ];
        self.run(args, output).await
    }

    async fn trim(&self, input: &Path, output: &Path, seconds: u32) -> Result<()> {
        tracing::debug!("Cutting first {}s of {}", seconds, input.display());

        let args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-t".into(),
            seconds.to_string().into(),
            "-acodec".into(),
            "copy".into(), // Stream copy, no re-encode
            "-y".into(),
            output.into(),
        ];
        self.run(args, output).await
    }

    async fn concatenate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        workspace: &Workspace,
    ) -> Result<()> {
        let manifest = workspace.path_for("file_list.txt");
        workspace.track(&manifest);
        fs_err::write(&manifest, manifest_contents(inputs)?)?;

        let args: Vec<OsString> = vec![
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            manifest.as_os_str().into(),
            "-c".into(),
            "copy".into(),
            "-y".into(),
            output.into(),
        ];
        let result = self.run(args, output).await;

        // The manifest goes away whether or not ffmpeg succeeded
        if let Err(e) = fs_err::remove_file(&manifest) {
            tracing::debug!("{}", e);
        }

        result
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Build the concat-demuxer manifest: one `file '<absolute path>'` line per input
pub fn manifest_contents(inputs: &[PathBuf]) -> Result<String> {
    let mut contents = String::new();
    for input in inputs {
        let absolute = std::path::absolute(input)?;
        let path = absolute.to_string_lossy().replace('\\', "/");
        contents.push_str(&format!("file '{}'\n", path.replace('\'', r"'\''")));
    }
    Ok(contents)
}
