//! Rate Limiting Module
//!
//! Keyed rate limiting using the governor library. Login and registration are keyed by
//! email, the assistant by user id.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::core::config::RateLimitSettings;

/// Per-key rate limiter
pub struct KeyedRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    cleanup_threshold: usize,
}

impl KeyedRateLimiter {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
                .allow_burst(NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: RateLimiter::keyed(quota),
            cleanup_threshold: 10000,
        }
    }

    /// Returns `true` when the request for `key` is allowed.
    pub fn check(&self, key: &str) -> bool {
        if self.limiter.len() > self.cleanup_threshold {
            self.limiter.retain_recent();
        }
        self.limiter.check_key(&key.to_string()).is_ok()
    }
}

impl std::fmt::Debug for KeyedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedRateLimiter")
            .field("tracked_keys", &self.limiter.len())
            .field("cleanup_threshold", &self.cleanup_threshold)
            .finish()
    }
}

/// Rate limit state shared across requests
#[derive(Debug)]
pub struct RateLimitState {
    pub auth_limiter: KeyedRateLimiter,
    pub assistant_limiter: KeyedRateLimiter,
}

impl RateLimitState {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            auth_limiter: KeyedRateLimiter::new(settings.auth_rps, settings.auth_burst),
            assistant_limiter: KeyedRateLimiter::new(
                settings.assistant_rps,
                settings.assistant_burst,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_block() {
        let limiter = KeyedRateLimiter::new(1, 3);
        assert!(limiter.check("user-a"));
        assert!(limiter.check("user-a"));
        assert!(limiter.check("user-a"));
        assert!(!limiter.check("user-a"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = KeyedRateLimiter::new(1, 1);
        assert!(limiter.check("user-a"));
        assert!(!limiter.check("user-a"));
        assert!(limiter.check("user-b"));
    }

    #[test]
    fn test_zero_values_fall_back_to_one() {
        let limiter = KeyedRateLimiter::new(0, 0);
        assert!(limiter.check("k"));
        assert!(!limiter.check("k"));
    }

    #[test]
    fn test_state_from_settings() {
        let settings = RateLimitSettings {
            auth_rps: 1,
            auth_burst: 2,
            assistant_rps: 1,
            assistant_burst: 1,
        };
        let state = RateLimitState::new(&settings);
        assert!(state.assistant_limiter.check("u"));
        assert!(!state.assistant_limiter.check("u"));
        assert!(state.auth_limiter.check("u"));
        assert!(state.auth_limiter.check("u"));
    }
}
