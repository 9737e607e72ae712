use std::time::Duration;

/// Size-scaled request deadline.
///
/// A fixed timeout under-provisions multi-gigabyte files and
/// over-provisions small ones, so the deadline grows with the payload:
/// `base + whole_megabytes * per_mb + finalize`. The finalize buffer
/// covers server-side work after the last byte (checksumming, moving the
/// blob into place).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Floor applied regardless of payload size.
    pub base: Duration,
    /// Extra allowance per whole megabyte of payload.
    pub per_mb: Duration,
    /// Flat buffer for post-transfer finalization.
    pub finalize: Duration,
}

impl TimeoutPolicy {
    /// Deadline that scales with payload size.
    pub const fn scaled(base: Duration, per_mb: Duration) -> Self {
        Self {
            base,
            per_mb,
            finalize: Duration::ZERO,
        }
    }

    /// Fixed deadline independent of payload size.
    pub const fn fixed(limit: Duration) -> Self {
        Self {
            base: limit,
            per_mb: Duration::ZERO,
            finalize: Duration::ZERO,
        }
    }

    /// Adds a flat finalization buffer on top of the scaled deadline.
    pub const fn with_finalize(mut self, finalize: Duration) -> Self {
        self.finalize = finalize;
        self
    }

    /// Computes the deadline for a payload of `size_bytes`.
    pub fn for_size(&self, size_bytes: u64) -> Duration {
        let mb = u32::try_from(size_bytes / (1024 * 1024)).unwrap_or(u32::MAX);
        self.base + self.per_mb * mb + self.finalize
    }
}
