use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::{BlockPolicy, RateLimitConfig};

/// Sliding-window request counter per user with a block set. Kept in memory
/// only; a restart forgets every window and block.
pub struct RateLimiter {
    windows: DashMap<i64, VecDeque<Instant>>,
    blocked: DashMap<i64, Instant>,
    window: Duration,
    max_requests: usize,
    policy: BlockPolicy,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            blocked: DashMap::new(),
            window: config.window,
            max_requests: config.max_requests,
            policy: config.block_policy,
        }
    }

    pub fn admit(&self, user_id: i64) -> bool {
        self.admit_at(user_id, Instant::now())
    }

    pub fn admit_at(&self, user_id: i64, now: Instant) -> bool {
        if self.is_blocked_at(user_id, now) {
            return false;
        }

        let mut entry = self.windows.entry(user_id).or_default();
        let stamps = entry.value_mut();
        while let Some(oldest) = stamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() >= self.max_requests {
            stamps.clear();
            drop(entry);
            self.blocked.insert(user_id, now);
            log::warn!("Blocking user {} after exceeding the request limit", user_id);
            return false;
        }

        stamps.push_back(now);
        true
    }

    pub fn is_blocked(&self, user_id: i64) -> bool {
        self.is_blocked_at(user_id, Instant::now())
    }

    fn is_blocked_at(&self, user_id: i64, now: Instant) -> bool {
        match self.policy {
            BlockPolicy::Permanent => self.blocked.contains_key(&user_id),
            BlockPolicy::Expiring(duration) => {
                let expired = self
                    .blocked
                    .remove_if(&user_id, |_, since| {
                        now.saturating_duration_since(*since) >= duration
                    })
                    .is_some();
                if expired {
                    log::info!("Block on user {} expired", user_id);
                }
                !expired && self.blocked.contains_key(&user_id)
            }
        }
    }

    /// Drops windows with no request inside the window; returns how many.
    pub fn prune_idle(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, stamps| {
            stamps
                .back()
                .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
        });
        before - self.windows.len()
    }

    pub fn tracked_users(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, block_policy: BlockPolicy) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests,
            block_policy,
        })
    }

    #[test]
    fn test_permanent_block_outlives_window() {
        let limiter = limiter(3, BlockPolicy::Permanent);
        let start = Instant::now();

        for i in 0..3 {
            assert!(limiter.admit_at(1, start + Duration::from_secs(i)));
        }
        assert!(!limiter.admit_at(1, start + Duration::from_secs(4)));
        assert!(!limiter.admit_at(1, start + Duration::from_secs(120)));
        assert!(!limiter.admit_at(1, start + Duration::from_secs(86_400)));
        assert!(limiter.admit_at(2, start + Duration::from_secs(4)));
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2, BlockPolicy::Permanent);
        let start = Instant::now();
        assert!(limiter.admit_at(1, start));
        assert!(limiter.admit_at(1, start + Duration::from_secs(30)));
        // the first stamp has left the window
        assert!(limiter.admit_at(1, start + Duration::from_secs(61)));
    }

    #[test]
    fn test_expiring_block_lifts() {
        let limiter = limiter(1, BlockPolicy::Expiring(Duration::from_secs(300)));
        let start = Instant::now();
        assert!(limiter.admit_at(1, start));
        assert!(!limiter.admit_at(1, start + Duration::from_secs(1)));
        assert!(!limiter.admit_at(1, start + Duration::from_secs(200)));
        assert!(limiter.admit_at(1, start + Duration::from_secs(302)));
    }

    #[test]
    fn test_prune_idle_windows() {
        let limiter = limiter(5, BlockPolicy::Permanent);
        let start = Instant::now();
        limiter.admit_at(1, start);
        limiter.admit_at(2, start + Duration::from_secs(50));
        assert_eq!(limiter.prune_idle(start + Duration::from_secs(70)), 1);
        assert_eq!(limiter.tracked_users(), 1);
    }
}
