use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::delivery::is_valid_email;
use crate::pipeline::MashupRequest;
use crate::{MashupError, Result};

/// Fewest videos a mashup may use (exclusive)
pub const MIN_COUNT: usize = 10;

/// Shortest clip length in seconds (exclusive)
pub const MIN_DURATION: u32 = 20;

#[derive(Parser)]
#[command(
    name = "mashup",
    about = "Build a short audio mashup of an artist from online videos",
    version,
    long_about = "Searches YouTube for videos of an artist, downloads their audio, cuts the first N seconds of each and joins the clips into one MP3. Uses yt-dlp for search and download and ffmpeg for audio work, with a built-in audio engine when ffmpeg is missing."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a mashup
    Create(CreateArgs),

    /// Show the configuration file in use
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Report which external tools were found
    Tools,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Artist or band to search for
    #[arg(value_name = "SUBJECT")]
    pub subject: String,

    /// Number of videos to use (more than 10)
    #[arg(value_name = "COUNT")]
    pub count: usize,

    /// Seconds taken from the start of each video (more than 20)
    #[arg(value_name = "DURATION")]
    pub duration: u32,

    /// Output file, must end in .mp3
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Email the mashup (zipped) to this address
    #[arg(long, value_name = "ADDRESS")]
    pub email: Option<String>,

    /// Also write a zip archive of the mashup
    #[arg(long, value_name = "ARCHIVE")]
    pub zip: Option<PathBuf>,

    /// Keep the mashup on disk after emailing it
    #[arg(long)]
    pub keep: bool,

    /// Mailjet API public key
    #[arg(long, env = "MJ_APIKEY_PUBLIC", hide_env_values = true)]
    pub mailjet_public_key: Option<String>,

    /// Mailjet API private key
    #[arg(long, env = "MJ_APIKEY_PRIVATE", hide_env_values = true)]
    pub mailjet_private_key: Option<String>,

    /// Sender address (overrides the config file)
    #[arg(long, env = "SENDER_EMAIL")]
    pub sender_email: Option<String>,

    /// Sender display name (overrides the config file)
    #[arg(long, env = "SENDER_NAME")]
    pub sender_name: Option<String>,
}

impl CreateArgs {
    /// Reject bad input before anything touches the network
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| Err(MashupError::InvalidRequest(message.to_string()));

        if self.subject.trim().is_empty() {
            return invalid("Artist name must not be empty");
        }
        if self.count <= MIN_COUNT {
            return invalid("Count must be > 10");
        }
        if self.duration <= MIN_DURATION {
            return invalid("Duration must be > 20");
        }
        let is_mp3 = self
            .output
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("mp3"));
        if !is_mp3 {
            return invalid("Output must be .mp3");
        }

        if let Some(address) = &self.email {
            if !is_valid_email(address) {
                return Err(MashupError::InvalidRequest(format!(
                    "Invalid email address: {}",
                    address
                )));
            }
            if self.mailjet_public_key.is_none() || self.mailjet_private_key.is_none() {
                return invalid("Emailing needs MJ_APIKEY_PUBLIC and MJ_APIKEY_PRIVATE");
            }
        }

        Ok(())
    }

    pub fn to_request(&self) -> MashupRequest {
        MashupRequest {
            subject: self.subject.trim().to_string(),
            count: self.count,
            clip_seconds: self.duration,
            output: self.output.clone(),
        }
    }

    /// Where the zip goes, if one is wanted
    ///
    /// Emailing without `--zip` packs next to the output.
    pub fn archive_path(&self) -> Option<PathBuf> {
        match (&self.zip, &self.email) {
            (Some(path), _) => Some(path.clone()),
            (None, Some(_)) => Some(self.output.with_extension("zip")),
            (None, None) => None,
        }
    }
}
