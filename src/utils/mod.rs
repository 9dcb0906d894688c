use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::config::ToolsConfig;
use crate::{MashupError, Result};

/// Lines of stderr kept in error messages
const STDERR_TAIL_LINES: usize = 5;

/// Run an external tool to completion, bounded by `timeout`
///
/// A non-zero exit status is an error carrying the tail of stderr. On timeout
/// the child is killed (it is spawned with `kill_on_drop`), as it is when the
/// returned future is dropped before completion.
pub async fn run_tool<I, S>(program: &Path, args: I, timeout: Duration) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect();
    let rendered = render_command(program, &args);
    tracing::debug!("Running: {}", rendered);

    let child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                MashupError::ToolUnavailable(program.display().to_string())
            } else {
                MashupError::Io(e)
            }
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            tracing::warn!("Killing {} after {}s", rendered, timeout.as_secs());
            return Err(MashupError::ToolTimeout {
                command: rendered,
                seconds: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        return Err(MashupError::ToolFailed {
            command: rendered,
            stderr: stderr_tail(&output.stderr),
        });
    }

    Ok(output)
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "no error output".to_string()
    } else {
        tail
    }
}

/// Resolved locations of the external tools
///
/// Built once at startup and handed to whatever needs a binary, so nothing
/// reads tool locations from process-wide state.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    pub ffmpeg: Option<PathBuf>,
    pub yt_dlp: Option<PathBuf>,
}

impl ToolPaths {
    /// Find both tools and check that they actually run
    pub async fn detect(config: &ToolsConfig) -> Self {
        let ffmpeg = match find_tool(config.ffmpeg_path.as_deref(), "ffmpeg") {
            Some(path) if check_command_available(&path, "-version").await => Some(path),
            _ => None,
        };
        let yt_dlp = match find_tool(config.yt_dlp_path.as_deref(), "yt-dlp") {
            Some(path) if check_command_available(&path, "--version").await => Some(path),
            _ => None,
        };

        tracing::debug!("Detected tools: ffmpeg={:?}, yt-dlp={:?}", ffmpeg, yt_dlp);

        Self { ffmpeg, yt_dlp }
    }

    /// Human-readable warnings for missing tools
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if self.yt_dlp.is_none() {
            missing.push("yt-dlp - required for searching and downloading videos".to_string());
        }

        if self.ffmpeg.is_none() {
            missing.push(
                "ffmpeg - recommended; the slower built-in audio engine is used without it"
                    .to_string(),
            );
        }

        missing
    }
}

/// Locate a binary: an explicit path (or name) wins over a PATH search
pub fn find_tool(configured: Option<&Path>, default_name: &str) -> Option<PathBuf> {
    let candidate = configured.unwrap_or_else(|| Path::new(default_name));
    which::which(candidate).ok()
}

/// Check if a command starts and exits successfully
async fn check_command_available(command: &Path, version_flag: &str) -> bool {
    Command::new(command)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
