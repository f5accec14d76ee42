//! Per-agent rate limiting over fixed one-period windows.
//!
//! Counters live in a DashMap and advance by compare-and-swap; no lock is
//! held across a request. Three quotas apply independently: overall
//! requests, searches, and writes.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use tmws_core::constants::{
    RATE_LIMIT_REQUESTS_PER_MIN, RATE_LIMIT_SEARCHES_PER_MIN, RATE_LIMIT_WRITES_PER_MIN,
};
use tmws_core::errors::{TmwsError, TmwsResult};

/// Which quota a call counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    Request,
    Search,
    Write,
}

/// Quota configuration.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub requests: u32,
    pub searches: u32,
    pub writes: u32,
    pub period_secs: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests: RATE_LIMIT_REQUESTS_PER_MIN,
            searches: RATE_LIMIT_SEARCHES_PER_MIN,
            writes: RATE_LIMIT_WRITES_PER_MIN,
            period_secs: 60,
        }
    }
}

/// One quota window: epoch-second start plus a counter.
struct Window {
    started: AtomicU64,
    count: AtomicU32,
}

impl Window {
    fn new(now: u64) -> Self {
        Self {
            started: AtomicU64::new(now),
            count: AtomicU32::new(0),
        }
    }

    /// Count one event. Returns the seconds until the window resets when
    /// the limit is exceeded.
    fn admit(&self, now: u64, limit: u32, period: u64) -> Result<(), u64> {
        let started = self.started.load(Ordering::Acquire);
        if now.saturating_sub(started) >= period {
            // Window elapsed: the first caller to swap resets the count.
            if self
                .started
                .compare_exchange(started, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.count.store(0, Ordering::Release);
            }
        }

        let used = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        if used > limit {
            let started = self.started.load(Ordering::Acquire);
            let elapsed = now.saturating_sub(started);
            Err(period.saturating_sub(elapsed).max(1))
        } else {
            Ok(())
        }
    }
}

struct AgentWindows {
    request: Window,
    search: Window,
    write: Window,
}

/// Sliding-window limiter keyed by agent id.
pub struct RateLimiter {
    limits: RateLimits,
    windows: DashMap<String, AgentWindows>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            windows: DashMap::new(),
        }
    }

    /// Count one event against `agent_id`'s quota of `kind`.
    /// Exceeding the quota is `ErrRateLimited` with a back-off hint.
    pub fn check(&self, agent_id: &str, kind: QuotaKind) -> TmwsResult<()> {
        let now = epoch_secs();
        let entry = self.windows.entry(agent_id.to_string()).or_insert_with(|| {
            AgentWindows {
                request: Window::new(now),
                search: Window::new(now),
                write: Window::new(now),
            }
        });

        let (window, limit) = match kind {
            QuotaKind::Request => (&entry.request, self.limits.requests),
            QuotaKind::Search => (&entry.search, self.limits.searches),
            QuotaKind::Write => (&entry.write, self.limits.writes),
        };

        window
            .admit(now, limit, self.limits.period_secs)
            .map_err(|retry_after_secs| {
                tracing::warn!(agent_id, ?kind, retry_after_secs, "rate limit exceeded");
                TmwsError::RateLimited { retry_after_secs }
            })
    }

    /// Drop all counters for an agent (used when an agent is unregistered).
    pub fn forget(&self, agent_id: &str) {
        self.windows.remove(agent_id);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_within_quota_pass() {
        let limiter = RateLimiter::new(RateLimits {
            requests: 5,
            ..Default::default()
        });
        for _ in 0..5 {
            limiter.check("agent", QuotaKind::Request).unwrap();
        }
    }

    #[test]
    fn request_past_quota_is_limited_with_hint() {
        let limiter = RateLimiter::new(RateLimits {
            requests: 1_000,
            ..Default::default()
        });
        for _ in 0..1_000 {
            limiter.check("busy-agent", QuotaKind::Request).unwrap();
        }
        let err = limiter.check("busy-agent", QuotaKind::Request).unwrap_err();
        assert_eq!(err.code(), "ErrRateLimited");
        let hint = err.retry_after().expect("hint present");
        assert!(hint >= 1 && hint <= 60, "retry_after {hint} outside window");
    }

    #[test]
    fn quotas_are_independent_per_kind() {
        let limiter = RateLimiter::new(RateLimits {
            requests: 100,
            searches: 2,
            writes: 2,
            period_secs: 60,
        });
        limiter.check("a", QuotaKind::Search).unwrap();
        limiter.check("a", QuotaKind::Search).unwrap();
        assert!(limiter.check("a", QuotaKind::Search).is_err());
        // Writes and requests are untouched by the search quota.
        limiter.check("a", QuotaKind::Write).unwrap();
        limiter.check("a", QuotaKind::Request).unwrap();
    }

    #[test]
    fn quotas_are_independent_per_agent() {
        let limiter = RateLimiter::new(RateLimits {
            searches: 1,
            ..Default::default()
        });
        limiter.check("first", QuotaKind::Search).unwrap();
        assert!(limiter.check("first", QuotaKind::Search).is_err());
        limiter.check("second", QuotaKind::Search).unwrap();
    }

    #[test]
    fn window_resets_after_period() {
        let limiter = RateLimiter::new(RateLimits {
            searches: 1,
            period_secs: 1,
            ..Default::default()
        });
        limiter.check("a", QuotaKind::Search).unwrap();
        assert!(limiter.check("a", QuotaKind::Search).is_err());
        std::thread::sleep(std::time::Duration::from_millis(1_100));
        limiter.check("a", QuotaKind::Search).unwrap();
    }

    #[test]
    fn forget_clears_counters() {
        let limiter = RateLimiter::new(RateLimits {
            searches: 1,
            ..Default::default()
        });
        limiter.check("a", QuotaKind::Search).unwrap();
        assert!(limiter.check("a", QuotaKind::Search).is_err());
        limiter.forget("a");
        limiter.check("a", QuotaKind::Search).unwrap();
    }
}
