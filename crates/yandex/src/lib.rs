//! Yandex Disk upload client.
//!
//! Two-step wire contract: a metadata GET obtains a short-lived signed
//! upload URL, then the file goes up as a single raw PUT to that URL.
//! Uploads run through the shared engine: every attempt is retry-wrapped,
//! and large files can escalate through increasingly defensive transport
//! tiers when the pooled default keeps failing.

use std::path::Path;
use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use vidship_config::{ConfigError, YandexConfig};
use vidship_transfer::{
    ProgressReader, RetryPolicy, Strategy, StrategyLadder, TimeoutPolicy, TransferError, Transport,
};

const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net/v1/disk";

/// Files strictly above this size are eligible for the defensive tiers.
const TIER_ESCALATION_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Pooled default: 8 min floor, 2 s per MB, 2 min finalize buffer.
const STANDARD: Transport = Transport::standard(
    "standard",
    TimeoutPolicy::scaled(Duration::from_secs(8 * 60), Duration::from_secs(2))
        .with_finalize(Duration::from_secs(2 * 60)),
);

/// Fresh connection per request, no compression, fixed 25 min deadline.
const CONSERVATIVE: Transport = Transport::conservative(
    "conservative",
    TimeoutPolicy::fixed(Duration::from_secs(25 * 60)),
);

/// Conservative plus 100-continue negotiation, fixed 40 min deadline.
const ULTRA_CONSERVATIVE: Transport = Transport::ultra_conservative(
    "ultra-conservative",
    TimeoutPolicy::fixed(Duration::from_secs(40 * 60)),
);

/// Transport tiers eligible for a payload of `size` bytes.
fn tiers_for_size(size: u64) -> &'static [Transport] {
    if size > TIER_ESCALATION_THRESHOLD {
        &[STANDARD, CONSERVATIVE, ULTRA_CONSERVATIVE]
    } else {
        &[STANDARD]
    }
}

/// Signed-upload-URL response shape.
#[derive(Debug, Deserialize)]
struct UploadUrl {
    #[serde(default)]
    href: String,
}

/// Yandex Disk client bound to one account and remote directory.
#[derive(Debug)]
pub struct YandexClient {
    oauth_token: String,
    upload_path: String,
    base_url: String,
    retry: RetryPolicy,
    ladder_cooldown: Duration,
}

impl YandexClient {
    /// Creates a client, validating required settings eagerly.
    ///
    /// The remote directory is normalized to a leading slash with no
    /// trailing slash.
    pub fn from_config(config: &YandexConfig) -> Result<Self, ConfigError> {
        if config.oauth_token.is_empty() {
            return Err(ConfigError::MissingField("yandex.oauth_token"));
        }

        let trimmed = config.upload_path.trim_end_matches('/');
        let upload_path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };

        Ok(Self {
            oauth_token: config.oauth_token.clone(),
            upload_path,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            ladder_cooldown: Duration::from_secs(10),
        })
    }

    /// Points the client at a different API host.
    #[cfg(test)]
    fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Shrinks retry and ladder waits so tests run in real time.
    #[cfg(test)]
    fn with_fast_timing(mut self) -> Self {
        self.retry = RetryPolicy {
            max_attempts: 3,
            backoff_unit: Duration::from_millis(5),
        };
        self.ladder_cooldown = Duration::from_millis(5);
        self
    }

    /// Single retry-wrapped upload on the standard tier.
    pub async fn upload(
        &self,
        local_path: &Path,
        remote_filename: &str,
    ) -> Result<(), TransferError> {
        self.retry
            .run("yandex upload", |_| {
                self.upload_attempt(local_path, remote_filename, &STANDARD)
            })
            .await
    }

    /// Full escalation ladder.
    ///
    /// The standard tier always runs first; files over the size
    /// threshold fall back to the conservative tiers once it is
    /// exhausted. Each tier applies its own retry budget.
    pub async fn chunked_upload(
        &self,
        local_path: &Path,
        remote_filename: &str,
    ) -> Result<(), TransferError> {
        let size = tokio::fs::metadata(local_path).await?.len();

        let strategies = tiers_for_size(size)
            .iter()
            .map(|tier| {
                Strategy::new(tier.name, move || {
                    Box::pin(self.retry.run(tier.name, move |_| {
                        self.upload_attempt(local_path, remote_filename, tier)
                    }))
                })
            })
            .collect();

        StrategyLadder::new(strategies)
            .with_cooldown(self.ladder_cooldown)
            .run()
            .await
    }

    /// One full GET-then-PUT cycle on the given transport tier.
    async fn upload_attempt(
        &self,
        local_path: &Path,
        remote_filename: &str,
        tier: &Transport,
    ) -> Result<(), TransferError> {
        let client = tier.build_client()?;

        let href = self.resolve_upload_url(&client, remote_filename).await?;
        debug!(href = %href, "resolved signed upload URL");

        let file = tokio::fs::File::open(local_path).await?;
        let size = file.metadata().await?.len();
        let deadline = tier.timeout.for_size(size);
        info!(
            file = %local_path.display(),
            size_mb = format_args!("{:.2}", size as f64 / 1024.0 / 1024.0),
            tier = tier.name,
            timeout_secs = deadline.as_secs(),
            "starting upload"
        );

        let body = reqwest::Body::wrap_stream(ReaderStream::new(ProgressReader::new(file, size)));
        let resp = client
            .put(&href)
            .header(AUTHORIZATION, format!("OAuth {}", self.oauth_token))
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(body)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| TransferError::from_request(e, deadline))?;

        let status = resp.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            info!(status = status.as_u16(), "upload accepted");
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(TransferError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Fetches a signed upload URL for the remote filename.
    ///
    /// The returned href is trusted as-is; a malformed URL surfaces as a
    /// transport error on the subsequent PUT.
    async fn resolve_upload_url(
        &self,
        client: &reqwest::Client,
        remote_filename: &str,
    ) -> Result<String, TransferError> {
        let remote_path = format!("{}/{}", self.upload_path, remote_filename);
        let escaped = utf8_percent_encode(&remote_path, NON_ALPHANUMERIC);
        let url = format!(
            "{}/resources/upload?path={escaped}&overwrite=true",
            self.base_url
        );

        let resp = client
            .get(&url)
            .header(AUTHORIZATION, format!("OAuth {}", self.oauth_token))
            .send()
            .await
            .map_err(|e| TransferError::Resolution(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransferError::Resolution(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }

        let upload: UploadUrl = resp
            .json()
            .await
            .map_err(|e| TransferError::Resolution(format!("bad response body: {e}")))?;
        if upload.href.is_empty() {
            return Err(TransferError::Resolution("empty href in response".into()));
        }
        Ok(upload.href)
    }
}
