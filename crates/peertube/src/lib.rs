//! PeerTube upload client.
//!
//! Publishes a video in a single multipart POST carrying the metadata
//! fields and the file content. Attempts are retry-wrapped by the shared
//! engine; the API has no chunked mode, so the "chunked" fallback is the
//! same uploader invoked again, kept for ladder symmetry with the disk
//! backend.

use std::path::Path;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::multipart;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use vidship_config::{ConfigError, PeertubeConfig};
use vidship_transfer::{
    ProgressReader, RetryPolicy, TimeoutPolicy, TransferError, Transport,
};

/// Upload deadline: 15 min floor plus 3 s per megabyte.
const UPLOAD_TRANSPORT: Transport = Transport::standard(
    "standard",
    TimeoutPolicy::scaled(Duration::from_secs(15 * 60), Duration::from_secs(3)),
);

/// Successful-upload response shape. Parsed on a best-effort basis; the
/// upload has already succeeded server-side by the time this is read.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    video: VideoInfo,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    uuid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    privacy: LabeledValue,
    #[serde(default)]
    channel: ChannelInfo,
}

#[derive(Debug, Default, Deserialize)]
struct LabeledValue {
    #[serde(default)]
    label: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelInfo {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "displayName")]
    display_name: String,
}

/// PeerTube client bound to one instance and channel.
#[derive(Debug)]
pub struct PeerTubeClient {
    server_url: String,
    access_token: String,
    channel_id: u32,
    privacy: u32,
    wait_transcoding: bool,
    default_description: String,
    retry: RetryPolicy,
}

impl PeerTubeClient {
    /// Creates a client, validating required settings eagerly and
    /// applying the documented defaults (privacy 1 = public, canned
    /// default description).
    pub fn from_config(config: &PeertubeConfig) -> Result<Self, ConfigError> {
        if config.server_url.is_empty() {
            return Err(ConfigError::MissingField("peertube.server_url"));
        }
        if config.access_token.is_empty() {
            return Err(ConfigError::MissingField("peertube.access_token"));
        }
        if config.channel_id == 0 {
            return Err(ConfigError::MissingField("peertube.channel_id"));
        }

        let privacy = if config.privacy == 0 { 1 } else { config.privacy };
        let default_description = if config.default_description.is_empty() {
            "Downloaded from YouTube".to_string()
        } else {
            config.default_description.clone()
        };

        Ok(Self {
            server_url: config.server_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            channel_id: config.channel_id,
            privacy,
            wait_transcoding: config.wait_transcoding,
            default_description,
            retry: RetryPolicy::default(),
        })
    }

    /// Shrinks retry waits so tests run in real time.
    #[cfg(test)]
    fn with_fast_timing(mut self) -> Self {
        self.retry = RetryPolicy {
            max_attempts: 3,
            backoff_unit: Duration::from_millis(5),
        };
        self
    }

    /// Retry-wrapped upload.
    pub async fn upload(
        &self,
        local_path: &Path,
        video_name: &str,
        video_desc: &str,
    ) -> Result<(), TransferError> {
        self.retry
            .run("peertube upload", |_| {
                self.upload_attempt(local_path, video_name, video_desc)
            })
            .await
    }

    /// Fallback named for ladder symmetry; the API has no chunked mode,
    /// so this is another pass of the standard uploader.
    pub async fn chunked_upload(
        &self,
        local_path: &Path,
        video_name: &str,
        video_desc: &str,
    ) -> Result<(), TransferError> {
        info!("peertube has no chunked mode; re-running the standard uploader");
        self.upload(local_path, video_name, video_desc).await
    }

    /// One complete multipart POST.
    async fn upload_attempt(
        &self,
        local_path: &Path,
        video_name: &str,
        video_desc: &str,
    ) -> Result<(), TransferError> {
        let file = tokio::fs::File::open(local_path).await?;
        let size = file.metadata().await?.len();
        let deadline = UPLOAD_TRANSPORT.timeout.for_size(size);

        let description = if video_desc.is_empty() {
            info!(description = %self.default_description, "using default description");
            self.default_description.clone()
        } else {
            video_desc.to_string()
        };

        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        info!(
            file = %filename,
            size_mb = format_args!("{:.2}", size as f64 / 1024.0 / 1024.0),
            timeout_secs = deadline.as_secs(),
            "starting upload"
        );

        let body = reqwest::Body::wrap_stream(ReaderStream::new(ProgressReader::new(file, size)));
        let file_part = multipart::Part::stream_with_length(body, size)
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| TransferError::Transport(e.to_string()))?;

        let form = multipart::Form::new()
            .text("name", video_name.to_string())
            .text("description", description)
            .text("channelId", self.channel_id.to_string())
            .text("privacy", self.privacy.to_string())
            .text("waitTranscoding", self.wait_transcoding.to_string())
            .part("videofile", file_part);

        let client = UPLOAD_TRANSPORT.build_client()?;
        let resp = client
            .post(format!("{}/api/v1/videos/upload", self.server_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .multipart(form)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| TransferError::from_request(e, deadline))?;

        let status = resp.status();
        let resp_body = resp
            .bytes()
            .await
            .map_err(|e| TransferError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(TransferError::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&resp_body).into_owned(),
            });
        }

        // The upload already succeeded server-side; an unparseable body
        // only costs the confirmation details.
        match serde_json::from_slice::<UploadResponse>(&resp_body) {
            Ok(parsed) => {
                info!(
                    id = parsed.video.id,
                    uuid = %parsed.video.uuid,
                    name = %parsed.video.name,
                    description = %parsed.video.description,
                    channel = %parsed.video.channel.display_name,
                    channel_handle = %parsed.video.channel.name,
                    privacy = %parsed.video.privacy.label,
                    watch_url = %format!("{}/w/{}", self.server_url, parsed.video.uuid),
                    "video published"
                );
            }
            Err(e) => {
                warn!(error = %e, "upload accepted but response body did not parse");
            }
        }

        Ok(())
    }
}
