//! Mashup - A Rust CLI tool for building short audio mashups of an artist
//!
//! This library locates videos for an artist, fetches their audio, normalizes each
//! clip to MP3, trims it to a fixed duration and joins the clips into one file. Each
//! audio step prefers an external `ffmpeg` binary and falls back to an in-process
//! decoder/encoder when the binary is not installed.

pub mod backend;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod fetcher;
pub mod locator;
pub mod media;
pub mod package;
pub mod pipeline;
pub mod utils;
pub mod workspace;

use std::path::PathBuf;

pub use backend::{AudioBackend, Backends};
pub use cli::{Cli, Commands, CreateArgs};
pub use config::Config;
pub use media::{CandidateRef, MediaFile, MediaStage, PipelineResult, Stage, StageReport};
pub use pipeline::{MashupPipeline, MashupRequest};
pub use workspace::{Workspace, WorkspaceGuard};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MashupError>;

/// Error types specific to the mashup pipeline
#[derive(thiserror::Error, Debug)]
pub enum MashupError {
    #[error("{0} is not available")]
    ToolUnavailable(String),

    #[error("{command} failed: {stderr}")]
    ToolFailed { command: String, stderr: String },

    #[error("{command} timed out after {seconds}s")]
    ToolTimeout { command: String, seconds: u64 },

    #[error("Expected output was not produced: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Audio decoding failed: {0}")]
    Decode(String),

    #[error("Audio encoding failed: {0}")]
    Encode(String),

    #[error("{}", .0.failure_message())]
    StageExhausted(Stage),

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
