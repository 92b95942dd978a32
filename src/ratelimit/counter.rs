//! Fixed-window request counter.

/// Per-client request count for the current fixed window.
///
/// A record is created lazily on the first request from a client, mutated in
/// place while its window is open, and replaced wholesale once `now` moves past
/// `reset_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    /// Requests counted in the current window
    pub count: u64,
    /// End of the current window, in milliseconds since the Unix epoch
    pub reset_at: u64,
}

impl WindowRecord {
    /// Open a fresh window starting at `now`.
    pub fn open(now: u64, window_ms: u64) -> Self {
        Self {
            count: 0,
            reset_at: now.saturating_add(window_ms),
        }
    }

    /// Whether the window has ended. `now == reset_at` still belongs to the window.
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.reset_at
    }

    /// Replace this record with a fresh window if it has expired.
    ///
    /// Returns `true` if the window was reset.
    pub fn roll(&mut self, now: u64, window_ms: u64) -> bool {
        if self.is_expired(now) {
            *self = Self::open(now, window_ms);
            true
        } else {
            false
        }
    }

    /// Count one request and return the new count.
    pub fn increment(&mut self) -> u64 {
        self.count = self.count.saturating_add(1);
        self.count
    }
}
