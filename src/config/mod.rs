use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External tool locations and limits
    pub tools: ToolsConfig,

    /// Pipeline behaviour
    pub pipeline: PipelineConfig,

    /// Email delivery settings (credentials come from the environment)
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary; searched on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit yt-dlp binary; searched on PATH when unset
    pub yt_dlp_path: Option<PathBuf>,

    /// Upper bound for any single external tool invocation
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory for transient files (current directory when unset)
    pub work_dir: Option<PathBuf>,

    /// Name prefix shared by every transient file
    pub temp_prefix: String,

    /// Pause between two fetches
    pub fetch_delay_ms: u64,

    /// Appended to the artist name when searching
    pub search_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Mailjet send endpoint
    pub mailjet_endpoint: String,

    /// Sender address, used when SENDER_EMAIL is not set
    pub sender_email: Option<String>,

    /// Sender display name, used when SENDER_NAME is not set
    pub sender_name: Option<String>,

    pub subject: String,
    pub body: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            yt_dlp_path: None,
            timeout_secs: 600,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            temp_prefix: "temp_".to_string(),
            fetch_delay_ms: 1500,
            search_suffix: "songs".to_string(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mailjet_endpoint: "https://api.mailjet.com/v3.1/send".to_string(),
            sender_email: None,
            sender_name: None,
            subject: "Your Mashup".to_string(),
            body: "Enjoy your mashup!".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("mashup").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        // An empty prefix would let the sweep match every file in the work dir
        if self.pipeline.temp_prefix.trim().is_empty() {
            anyhow::bail!("pipeline.temp_prefix must not be empty");
        }

        if self.pipeline.temp_prefix.contains(['/', '\\']) {
            anyhow::bail!("pipeline.temp_prefix must not contain path separators");
        }

        if self.tools.timeout_secs == 0 {
            anyhow::bail!("tools.timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Directory that holds transient files
    pub fn work_dir(&self) -> Result<PathBuf> {
        match &self.pipeline.work_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Could not determine current directory"),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_secs)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.pipeline.fetch_delay_ms)
    }

    /// Display current configuration
    pub fn display(&self) {
        let or_path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(search PATH)".to_string())
        };

        println!("Current Configuration:");
        println!("  ffmpeg: {}", or_path(&self.tools.ffmpeg_path));
        println!("  yt-dlp: {}", or_path(&self.tools.yt_dlp_path));
        println!("  Tool Timeout: {}s", self.tools.timeout_secs);
        println!(
            "  Work Dir: {}",
            self.pipeline
                .work_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(current directory)".to_string())
        );
        println!("  Temp Prefix: {}", self.pipeline.temp_prefix);
        println!("  Fetch Delay: {}ms", self.pipeline.fetch_delay_ms);
        println!("  Search Suffix: {}", self.pipeline.search_suffix);
        println!("  Mailjet Endpoint: {}", self.delivery.mailjet_endpoint);
        if let Some(sender) = &self.delivery.sender_email {
            println!("  Sender: {}", sender);
        }
        if let Ok(path) = Self::config_path() {
            println!("  Config File: {}", path.display());
        }
    }
}
