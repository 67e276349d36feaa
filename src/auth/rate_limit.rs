//! Rate limiting primitives for auth flows.
//!
//! Applied at the HTTP boundary before the orchestrator runs; the core state
//! machine stays safe to call repeatedly with the same input either way.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    Login,
    ForgotPassword,
    ResetPassword,
    VerifyEmail,
    ResendVerification,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    /// Check and record one attempt for `key` (usually a client IP).
    fn check(&self, key: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

const WINDOW: Duration = Duration::from_secs(15 * 60);
const TOKEN_FLOW_LIMIT: usize = 3;
const GENERAL_LIMIT: usize = 100;

/// In-memory rolling-window limiter: 3 attempts per 15 minutes for the
/// email-sending flows, 100 per 15 minutes for the rest, keyed per client.
///
/// State is process-local; multi-instance deployments need a shared backend
/// behind the same trait.
#[derive(Debug)]
pub struct RollingWindowLimiter {
    window: Duration,
    attempts: Mutex<HashMap<(String, RateLimitAction), Vec<Instant>>>,
}

impl Default for RollingWindowLimiter {
    fn default() -> Self {
        Self {
            window: WINDOW,
            attempts: Mutex::default(),
        }
    }
}

impl RollingWindowLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_window(window: Duration) -> Self {
        Self {
            window,
            attempts: Mutex::default(),
        }
    }

    const fn limit_for(action: RateLimitAction) -> usize {
        match action {
            RateLimitAction::ForgotPassword | RateLimitAction::ResendVerification => {
                TOKEN_FLOW_LIMIT
            }
            RateLimitAction::Register
            | RateLimitAction::Login
            | RateLimitAction::ResetPassword
            | RateLimitAction::VerifyEmail => GENERAL_LIMIT,
        }
    }
}

impl RateLimiter for RollingWindowLimiter {
    fn check(&self, key: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        // Unattributable clients are not limited; the proxy layer in front is
        // expected to supply an address.
        let Some(key) = key else {
            return RateLimitDecision::Allowed;
        };

        let now = Instant::now();
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            // A poisoned lock means a panic elsewhere; fail open rather than
            // lock everyone out.
            Err(poisoned) => poisoned.into_inner(),
        };
        // Drop keys whose attempts have all aged out, so the map does not
        // grow with every client address ever seen.
        attempts.retain(|_, stamps| {
            stamps.retain(|at| now.duration_since(*at) < self.window);
            !stamps.is_empty()
        });
        let entry = attempts
            .entry((key.to_string(), action))
            .or_insert_with(Vec::new);

        if entry.len() >= Self::limit_for(action) {
            return RateLimitDecision::Limited;
        }

        entry.push(now);
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.check(None, RateLimitAction::Register),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check(Some("1.2.3.4"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn forgot_password_limited_after_three_attempts() {
        let limiter = RollingWindowLimiter::new();
        for _ in 0..3 {
            assert_eq!(
                limiter.check(Some("1.2.3.4"), RateLimitAction::ForgotPassword),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check(Some("1.2.3.4"), RateLimitAction::ForgotPassword),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn limits_are_per_key_and_per_action() {
        let limiter = RollingWindowLimiter::new();
        for _ in 0..3 {
            limiter.check(Some("1.2.3.4"), RateLimitAction::ForgotPassword);
        }

        // A different client is unaffected.
        assert_eq!(
            limiter.check(Some("5.6.7.8"), RateLimitAction::ForgotPassword),
            RateLimitDecision::Allowed
        );
        // Same client, different action is unaffected.
        assert_eq!(
            limiter.check(Some("1.2.3.4"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn missing_key_is_not_limited() {
        let limiter = RollingWindowLimiter::new();
        for _ in 0..10 {
            assert_eq!(
                limiter.check(None, RateLimitAction::ForgotPassword),
                RateLimitDecision::Allowed
            );
        }
    }

    #[test]
    fn reset_password_uses_general_limit() {
        let limiter = RollingWindowLimiter::new();
        for _ in 0..GENERAL_LIMIT {
            assert_eq!(
                limiter.check(Some("1.2.3.4"), RateLimitAction::ResetPassword),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check(Some("1.2.3.4"), RateLimitAction::ResetPassword),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn idle_keys_are_swept() {
        // A zero-length window ages every attempt out immediately, so each
        // check should leave only its own key behind.
        let limiter = RollingWindowLimiter::with_window(Duration::ZERO);
        limiter.check(Some("1.2.3.4"), RateLimitAction::Login);
        limiter.check(Some("5.6.7.8"), RateLimitAction::Login);

        let attempts = limiter.attempts.lock().expect("not poisoned");
        assert_eq!(attempts.len(), 1);
        assert!(attempts.contains_key(&("5.6.7.8".to_string(), RateLimitAction::Login)));
    }
}
