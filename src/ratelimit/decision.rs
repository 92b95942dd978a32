//! Admission decisions and their advisory header values.

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request is admitted
    pub admit: bool,
    /// Maximum requests per window
    pub limit: u64,
    /// Requests left in the current window, never negative
    pub remaining: u64,
    /// End of the current window, in milliseconds since the Unix epoch
    pub reset_at: u64,
}

impl Decision {
    /// Window end in whole seconds since the epoch, rounded up.
    ///
    /// This is the value sent as `X-RateLimit-Reset`.
    pub fn reset_secs(&self) -> u64 {
        self.reset_at.div_ceil(1000)
    }

    /// Seconds a rejected client should wait before retrying, at least 1.
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        self.reset_at.saturating_sub(now).div_ceil(1000).max(1)
    }
}
