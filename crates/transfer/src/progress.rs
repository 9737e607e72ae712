use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, ReadBuf};
use tracing::{info, warn};

/// Minimum gap between two progress reports.
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Byte accounting for one transfer.
///
/// Owned exclusively by the reader of a single transfer and destroyed
/// with it; `transferred` is monotonically non-decreasing.
#[derive(Debug, Clone)]
pub struct ProgressState {
    total: u64,
    transferred: u64,
    last_report: Instant,
    bytes_at_last_report: u64,
    stalled_intervals: u32,
}

impl ProgressState {
    fn new(total: u64) -> Self {
        Self {
            total,
            transferred: 0,
            last_report: Instant::now(),
            bytes_at_last_report: 0,
            stalled_intervals: 0,
        }
    }

    /// Total bytes expected for this transfer.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes read so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Completion percentage. An empty transfer counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.transferred as f64 / self.total as f64 * 100.0
        }
    }

    /// Consecutive report intervals in which no bytes moved.
    pub fn stalled_intervals(&self) -> u32 {
        self.stalled_intervals
    }

    /// Records `n` freshly read bytes and reports when the interval elapsed.
    fn advance(&mut self, n: usize) {
        self.transferred += n as u64;

        let elapsed = self.last_report.elapsed();
        if elapsed < REPORT_INTERVAL {
            return;
        }

        let delta = self.transferred - self.bytes_at_last_report;
        if delta == 0 {
            self.stalled_intervals += 1;
            warn!(
                percent = format_args!("{:.1}", self.percent()),
                transferred_mb = format_args!("{:.2}", mb(self.transferred)),
                total_mb = format_args!("{:.2}", mb(self.total)),
                stalled_intervals = self.stalled_intervals,
                "upload stalled"
            );
        } else {
            self.stalled_intervals = 0;
            let bytes_per_sec = delta as f64 / elapsed.as_secs_f64();
            info!(
                percent = format_args!("{:.1}", self.percent()),
                transferred_mb = format_args!("{:.2}", mb(self.transferred)),
                total_mb = format_args!("{:.2}", mb(self.total)),
                kb_per_sec = format_args!("{:.1}", bytes_per_sec / 1024.0),
                "upload progress"
            );
        }

        self.bytes_at_last_report = self.transferred;
        self.last_report = Instant::now();
    }
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

/// Transparent [`AsyncRead`] wrapper that accounts transferred bytes.
///
/// Forwards every read unchanged (same bytes, same errors) while updating
/// a [`ProgressState`] and periodically emitting one telemetry line.
/// Observability only: it never fails a transfer by itself.
pub struct ProgressReader<R> {
    inner: R,
    state: ProgressState,
}

impl<R> ProgressReader<R> {
    /// Wraps `inner`, expecting `total` bytes in this transfer.
    pub fn new(inner: R, total: u64) -> Self {
        Self {
            inner,
            state: ProgressState::new(total),
        }
    }

    /// Current byte accounting.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut me.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = buf.filled().len() - before;
                me.state.advance(n);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn forwards_bytes_unchanged() {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).map(|b: u16| b as u8).collect();
        let mut reader = ProgressReader::new(data.as_slice(), data.len() as u64);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, data);
        assert_eq!(reader.state().transferred(), data.len() as u64);
    }

    #[tokio::test]
    async fn transferred_is_monotonic_and_bounded() {
        let data = vec![7u8; 4096];
        let mut reader = ProgressReader::new(data.as_slice(), data.len() as u64);

        let mut buf = [0u8; 512];
        let mut last = 0u64;
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            let transferred = reader.state().transferred();
            assert!(transferred >= last, "progress went backwards");
            assert!(transferred <= reader.state().total());
            last = transferred;
            if n == 0 {
                break;
            }
        }
        assert_eq!(last, data.len() as u64);
    }

    #[test]
    fn percent_of_empty_transfer_is_complete() {
        let state = ProgressState::new(0);
        assert_eq!(state.percent(), 100.0);
    }

    #[test]
    fn percent_midway() {
        let mut state = ProgressState::new(200);
        state.advance(50);
        assert!((state.percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stall_counter_increments_without_movement() {
        let mut state = ProgressState::new(1000);
        state.advance(100);

        // Force the interval to elapse with no new bytes.
        state.last_report = Instant::now() - Duration::from_secs(6);
        state.advance(0);
        assert_eq!(state.stalled_intervals(), 1);

        state.last_report = Instant::now() - Duration::from_secs(6);
        state.advance(0);
        assert_eq!(state.stalled_intervals(), 2);
    }

    #[test]
    fn stall_counter_resets_on_movement() {
        let mut state = ProgressState::new(1000);
        state.last_report = Instant::now() - Duration::from_secs(6);
        state.advance(0);
        assert_eq!(state.stalled_intervals(), 1);

        state.last_report = Instant::now() - Duration::from_secs(6);
        state.advance(10);
        assert_eq!(state.stalled_intervals(), 0);
    }

    #[tokio::test]
    async fn error_semantics_pass_through() {
        struct FailingReader;

        impl AsyncRead for FailingReader {
            fn poll_read(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &mut ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Ready(Err(io::Error::other("disk gone")))
            }
        }

        let mut reader = ProgressReader::new(FailingReader, 100);
        let mut buf = [0u8; 16];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.to_string(), "disk gone");
        assert_eq!(reader.state().transferred(), 0);
    }
}
