//! Configuration loading and validation.
//!
//! One TOML file configures the whole pipeline:
//!
//! ```toml
//! upload_destination = "yandex"
//! delete_after_upload = true
//!
//! [downloader]
//! cookies_path = "cookies.txt"
//! output_dir = "downloads"
//!
//! [yandex]
//! oauth_token = "y0_..."
//! upload_path = "/videos"
//!
//! [peertube]
//! server_url = "https://tube.example.org"
//! access_token = "..."
//! channel_id = 3
//! ```
//!
//! Parsing is lenient (every field has a default or is optional);
//! required fields are validated eagerly when the owning client is
//! constructed, so a missing credential fails fast instead of at the
//! first network call.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Configuration errors. All fatal; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting: {0}")]
    MissingField(&'static str),

    #[error("invalid setting {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

/// Supported upload destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Yandex,
    Peertube,
}

impl FromStr for Destination {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yandex" => Ok(Self::Yandex),
            "peertube" => Ok(Self::Peertube),
            other => Err(ConfigError::InvalidField {
                field: "upload_destination",
                reason: format!("{other:?} (must be \"yandex\" or \"peertube\")"),
            }),
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yandex => f.write_str("yandex"),
            Self::Peertube => f.write_str("peertube"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default upload destination; overridable per run.
    #[serde(default)]
    pub upload_destination: Option<String>,

    /// Delete the local file after a successful upload.
    #[serde(default)]
    pub delete_after_upload: bool,

    #[serde(default)]
    pub downloader: DownloaderConfig,

    pub yandex: Option<YandexConfig>,

    pub peertube: Option<PeertubeConfig>,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolves the effective destination: a CLI override wins over the
    /// config file; neither present is an error.
    pub fn effective_destination(
        &self,
        cli_override: Option<Destination>,
    ) -> Result<Destination, ConfigError> {
        if let Some(dest) = cli_override {
            return Ok(dest);
        }
        match self.upload_destination.as_deref() {
            Some(s) if !s.is_empty() => s.parse(),
            _ => Err(ConfigError::MissingField("upload_destination")),
        }
    }

    /// Resolves the effective deletion policy: a `--keep` flag overrides
    /// the config file.
    pub fn should_delete(&self, keep_flag: bool) -> bool {
        self.delete_after_upload && !keep_flag
    }
}

/// Settings for the yt-dlp invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Cookies file handed to yt-dlp.
    #[serde(default = "default_cookies_path")]
    pub cookies_path: String,

    /// Directory downloads are written to (created if absent).
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_cookies_path() -> String {
    "cookies.txt".into()
}

fn default_output_dir() -> String {
    "downloads".into()
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            cookies_path: default_cookies_path(),
            output_dir: default_output_dir(),
        }
    }
}

/// Settings for the Yandex Disk backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YandexConfig {
    /// OAuth token. Required; validated at client construction.
    #[serde(default)]
    pub oauth_token: String,

    /// Remote directory uploads land in.
    #[serde(default)]
    pub upload_path: String,
}

/// Settings for the PeerTube backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeertubeConfig {
    /// Instance base URL. Required; validated at client construction.
    #[serde(default)]
    pub server_url: String,

    /// Bearer token. Required; validated at client construction.
    #[serde(default)]
    pub access_token: String,

    /// Target channel id. Required; validated at client construction.
    #[serde(default)]
    pub channel_id: u32,

    /// Privacy setting (1 = public).
    #[serde(default = "default_privacy")]
    pub privacy: u32,

    /// Wait for transcoding before the video is published.
    #[serde(default)]
    pub wait_transcoding: bool,

    /// Description used when the caller supplies none.
    #[serde(default = "default_description")]
    pub default_description: String,
}

fn default_privacy() -> u32 {
    1
}

fn default_description() -> String {
    "Downloaded from YouTube".into()
}

impl Default for PeertubeConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            access_token: String::new(),
            channel_id: 0,
            privacy: default_privacy(),
            wait_transcoding: false,
            default_description: default_description(),
        }
    }
}
