use std::time::Duration;

use reqwest::header::{ACCEPT_ENCODING, CONNECTION, EXPECT, HeaderMap, HeaderValue};

use crate::{TimeoutPolicy, TransferError};

/// HTTP transport tuning for one rung of the escalation ladder.
///
/// Some upload APIs intermittently misbehave under connection reuse or
/// response compression for very large payload PUTs; later tiers strip
/// those optimizations and trade latency for reliability.
#[derive(Debug, Clone, Copy)]
pub struct Transport {
    /// Tier name used in strategy and log output.
    pub name: &'static str,
    /// Keep connections alive between requests.
    pub reuse_connections: bool,
    /// Allow compressed responses.
    pub compression: bool,
    /// Idle connections kept per host when reuse is enabled.
    pub max_idle_connections: usize,
    /// Send `Expect: 100-continue` before the body.
    pub expect_continue: bool,
    /// Deadline policy for requests on this tier.
    pub timeout: TimeoutPolicy,
}

impl Transport {
    /// Pooled transport with connection reuse and compression.
    pub const fn standard(name: &'static str, timeout: TimeoutPolicy) -> Self {
        Self {
            name,
            reuse_connections: true,
            compression: true,
            max_idle_connections: 10,
            expect_continue: false,
            timeout,
        }
    }

    /// Single-use connections, no compression, `Connection: close`.
    pub const fn conservative(name: &'static str, timeout: TimeoutPolicy) -> Self {
        Self {
            name,
            reuse_connections: false,
            compression: false,
            max_idle_connections: 1,
            expect_continue: false,
            timeout,
        }
    }

    /// [`Transport::conservative`] plus `Expect: 100-continue`.
    pub const fn ultra_conservative(name: &'static str, timeout: TimeoutPolicy) -> Self {
        Self {
            name,
            reuse_connections: false,
            compression: false,
            max_idle_connections: 1,
            expect_continue: true,
            timeout,
        }
    }

    /// Builds a reqwest client tuned for this tier.
    ///
    /// The request deadline depends on the payload size and is attached
    /// per request, not here.
    pub fn build_client(&self) -> Result<reqwest::Client, TransferError> {
        let idle_per_host = if self.reuse_connections {
            self.max_idle_connections
        } else {
            0
        };

        reqwest::Client::builder()
            .default_headers(self.headers())
            .pool_max_idle_per_host(idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransferError::Transport(e.to_string()))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.reuse_connections {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
        if !self.compression {
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        }
        if self.expect_continue {
            headers.insert(EXPECT, HeaderValue::from_static("100-continue"));
        }
        headers
    }
}
