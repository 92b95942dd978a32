//! Core fixed-window rate limiter.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

use super::client::ClientId;
use super::counter::WindowRecord;
use super::decision::Decision;
use crate::error::{Jam3aError, Result};

/// Parameters of a single limiter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Length of each counting window in milliseconds
    pub window_ms: u64,
    /// Maximum admitted requests per window per client
    pub max: u64,
    /// Minimum time between sweeps of expired records
    pub sweep_interval_ms: u64,
}

impl LimiterConfig {
    /// Create a limiter configuration that sweeps once per window.
    pub fn new(window_ms: u64, max: u64) -> Self {
        Self {
            window_ms,
            max,
            sweep_interval_ms: window_ms,
        }
    }

    /// Override how often expired records are swept.
    pub fn with_sweep_interval(mut self, sweep_interval_ms: u64) -> Self {
        self.sweep_interval_ms = sweep_interval_ms;
        self
    }

    /// Reject zero-length windows and zero quotas.
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(Jam3aError::Config("window_ms must be positive".to_string()));
        }
        if self.max == 0 {
            return Err(Jam3aError::Config("max must be positive".to_string()));
        }
        Ok(())
    }
}

/// Per-client fixed-window rate limiter.
///
/// Each instance owns its own client map, so independent limiters never share
/// counters. The map is sharded; a single `check` holds the shard lock for its
/// key across the reset-increment sequence, which makes it safe to share the
/// limiter across request-handling threads behind an `Arc`.
///
/// Expired records are swept lazily: the first `check` after
/// `sweep_interval_ms` has elapsed removes every record whose window has
/// ended. While `now` only moves forward this is invisible, because the next
/// request from that client would reset the record anyway. A request that
/// arrives after a sweep carrying an older `now` (threads reading the clock
/// slightly out of order) finds no record and opens a fresh window at that
/// `now`, so its client may get up to one window of extra quota.
pub struct RateLimiter {
    /// Window records indexed by client identifier
    records: DashMap<String, WindowRecord>,
    config: LimiterConfig,
    /// Time of the last sweep, in milliseconds since the epoch
    last_sweep: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter, validating its configuration.
    pub fn new(config: LimiterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            records: DashMap::new(),
            config,
            last_sweep: AtomicU64::new(0),
        })
    }

    /// Count a request from `client_id` at time `now` and decide whether to admit it.
    ///
    /// Empty identifiers are bucketed under [`super::UNKNOWN_CLIENT`].
    pub fn check(&self, client_id: &str, now: u64) -> Decision {
        let key = ClientId::normalize(client_id);
        self.maybe_sweep(now);

        let window_ms = self.config.window_ms;
        let (count, reset_at) = {
            let mut record = self.records.entry(key.as_str().to_string()).or_insert_with(|| {
                debug!(key = %key, window_ms, "Creating new window record");
                WindowRecord::open(now, window_ms)
            });

            if record.roll(now, window_ms) {
                trace!(key = %key, reset_at = record.reset_at, "Window expired, reset");
            }

            let count = record.increment();
            (count, record.reset_at)
        };

        let max = self.config.max;
        let admit = count <= max;
        let remaining = max.saturating_sub(count);

        trace!(key = %key, count, remaining, reset_at, admit, "Checked rate limit");
        if !admit {
            debug!(key = %key, limit = max, "Rate limit exceeded");
        }

        Decision {
            admit,
            limit: max,
            remaining,
            reset_at,
        }
    }

    /// Remove every record whose window ended before `now`.
    ///
    /// Returns the number of evicted records.
    pub fn sweep(&self, now: u64) -> usize {
        let mut evicted = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired(now);
            if !keep {
                evicted += 1;
            }
            keep
        });
        self.last_sweep.store(now, Ordering::SeqCst);

        if evicted > 0 {
            debug!(evicted, remaining = self.records.len(), "Swept expired window records");
        }
        evicted
    }

    fn maybe_sweep(&self, now: u64) {
        let last = self.last_sweep.load(Ordering::SeqCst);
        if now.saturating_sub(last) < self.config.sweep_interval_ms {
            return;
        }
        // Only the thread that wins the exchange sweeps.
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.sweep(now);
        }
    }

    /// Requests counted so far in the current window for `client_id`.
    ///
    /// Returns `None` if no record exists.
    pub fn count_for(&self, client_id: &str) -> Option<u64> {
        let key = ClientId::normalize(client_id);
        self.records.get(key.as_str()).map(|record| record.count)
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no client is currently tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Maximum admitted requests per window.
    pub fn limit(&self) -> u64 {
        self.config.max
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.config.window_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::UNKNOWN_CLIENT;
    use std::sync::Arc;

    fn limiter(window_ms: u64, max: u64) -> RateLimiter {
        RateLimiter::new(LimiterConfig::new(window_ms, max)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(RateLimiter::new(LimiterConfig::new(0, 5)).is_err());
        assert!(RateLimiter::new(LimiterConfig::new(1_000, 0)).is_err());
    }

    #[test]
    fn test_first_check_in_fresh_window() {
        let limiter = limiter(1_000, 5);
        let decision = limiter.check("a", 0);

        assert!(decision.admit);
        assert_eq!(decision.limit, 5);
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.reset_at, 1_000);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_max_admitted_then_rejected() {
        let limiter = limiter(1_000, 5);

        for i in 0..5 {
            assert!(limiter.check("a", i).admit);
        }

        // The 6th request should be rejected
        let decision = limiter.check("a", 5);
        assert!(!decision.admit);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_documented_scenario() {
        let limiter = limiter(60_000, 2);

        let expected = [
            (0, true, 1, 60_000),
            (10, true, 0, 60_000),
            (20, false, 0, 60_000),
            (61_000, true, 1, 121_000),
        ];
        for (now, admit, remaining, reset_at) in expected {
            let decision = limiter.check("a", now);
            assert_eq!(decision.admit, admit, "admit at t={now}");
            assert_eq!(decision.remaining, remaining, "remaining at t={now}");
            assert_eq!(decision.reset_at, reset_at, "reset_at at t={now}");
        }
    }

    #[test]
    fn test_reset_after_rejection() {
        let limiter = limiter(100, 1);

        assert!(limiter.check("a", 0).admit);
        assert!(!limiter.check("a", 1).admit);
        assert!(!limiter.check("a", 2).admit);

        let decision = limiter.check("a", 101);
        assert!(decision.admit);
        assert_eq!(limiter.count_for("a"), Some(1));
    }

    #[test]
    fn test_reset_at_stable_within_window() {
        let limiter = limiter(1_000, 100);
        let first = limiter.check("a", 10).reset_at;

        for now in [20, 500, 999, 1_010] {
            assert_eq!(limiter.check("a", now).reset_at, first);
        }
    }

    #[test]
    fn test_clients_are_isolated() {
        let limiter = limiter(1_000, 1);

        assert!(limiter.check("a", 0).admit);
        assert!(!limiter.check("a", 1).admit);

        let decision = limiter.check("b", 2);
        assert!(decision.admit);
        assert_eq!(decision.reset_at, 1_002);
        assert_eq!(limiter.count_for("a"), Some(2));
        assert_eq!(limiter.count_for("b"), Some(1));
    }

    #[test]
    fn test_empty_id_uses_sentinel() {
        let limiter = limiter(1_000, 10);

        limiter.check("", 0);
        limiter.check("  ", 1);

        assert_eq!(limiter.count_for(UNKNOWN_CLIENT), Some(2));
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let limiter = limiter(100, 10);
        limiter.check("old", 0);
        limiter.check("fresh", 90);

        assert_eq!(limiter.sweep(150), 1);
        assert_eq!(limiter.count_for("old"), None);
        assert_eq!(limiter.count_for("fresh"), Some(1));

        // A swept client starts over as if new
        let decision = limiter.check("old", 160);
        assert_eq!(decision.remaining, 9);
        assert_eq!(decision.reset_at, 260);
    }

    #[test]
    fn test_lazy_sweep_on_check() {
        let limiter =
            RateLimiter::new(LimiterConfig::new(100, 10).with_sweep_interval(500)).unwrap();
        for i in 0..20 {
            limiter.check(&format!("client-{i}"), 0);
        }
        assert_eq!(limiter.len(), 20);

        // Not yet time to sweep
        limiter.check("late", 400);
        assert_eq!(limiter.len(), 21);

        limiter.check("later", 600);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.count_for("later"), Some(1));
    }

    #[test]
    fn test_out_of_order_check_after_sweep_opens_new_window() {
        let limiter = limiter(100, 10);

        limiter.check("a", 0);
        // Past the sweep interval; evicts "a" (reset_at 100)
        limiter.check("b", 250);
        assert_eq!(limiter.count_for("a"), None);

        // A late request with an older timestamp starts over from its own `now`
        let decision = limiter.check("a", 50);
        assert!(decision.admit);
        assert_eq!(decision.remaining, 9);
        assert_eq!(decision.reset_at, 150);
    }

    #[test]
    fn test_clear_records() {
        let limiter = limiter(1_000, 10);
        limiter.check("a", 0);
        assert!(!limiter.is_empty());

        limiter.clear();
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_concurrent_checks_count_exactly() {
        let limiter = Arc::new(limiter(60_000, 100));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..25).filter(|_| limiter.check("shared", 10).admit).count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
        assert_eq!(limiter.count_for("shared"), Some(200));
    }
}
