// Retry delays for pushes and pulls.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with capped, jittered delays.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Add up to 25% random jitter before applying the cap.
    pub jitter: bool,
    /// Added to the worst-case delay after a 429.
    pub rate_limit_penalty: Duration,
}

impl RetryPolicy {
    const MAX_JITTER: f64 = 0.25;

    pub fn for_push() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
            rate_limit_penalty: Duration::from_secs(30),
        }
    }

    pub fn for_pull() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            ..Self::for_push()
        }
    }

    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::for_push()
        }
    }

    /// Delay before retry number `attempt` (1-based: the delay after the
    /// first failure is `delay(1)`).
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter {
            rand::rng().random_range(0.0..Self::MAX_JITTER)
        } else {
            0.0
        };
        self.delay_with_jitter(attempt, jitter)
    }

    /// Deterministic variant of [`delay`](Self::delay).
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let jittered = base * (1.0 + jitter.clamp(0.0, Self::MAX_JITTER));
        Duration::from_secs_f64(jittered.min(self.max_delay.as_secs_f64()))
    }

    /// Largest delay `delay(attempt)` can return.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, Self::MAX_JITTER)
    }

    /// Delay after a 429: never shorter than the server asked for, and
    /// always longer than any ordinary backoff at the same attempt.
    pub fn rate_limited_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let floor = self.ceiling(attempt) + self.rate_limit_penalty;
        retry_after.map_or(floor, |server| server.max(floor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_push()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let policy = RetryPolicy::for_push();
        let delays: Vec<Duration> = (1..=8).map(|n| policy.delay_with_jitter(n, 0.0)).collect();
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_secs(2));
        assert_eq!(delays[4], Duration::from_secs(16));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays[7], Duration::from_secs(30));
    }

    #[test]
    fn pulls_start_slower_and_cap_higher() {
        let push = RetryPolicy::for_push();
        let pull = RetryPolicy::for_pull();
        assert_eq!(pull.delay_with_jitter(1, 0.0), Duration::from_secs(2));
        assert_eq!(pull.delay_with_jitter(10, 0.0), Duration::from_secs(60));
        assert!(pull.max_delay > push.max_delay);
        assert!(pull.max_attempts < push.max_attempts);
    }

    #[test]
    fn jitter_stays_within_ceiling() {
        let policy = RetryPolicy::for_push();
        for attempt in 1..=6 {
            for _ in 0..50 {
                let d = policy.delay(attempt);
                assert!(d >= policy.delay_with_jitter(attempt, 0.0));
                assert!(d <= policy.ceiling(attempt));
                assert!(d <= policy.max_delay);
            }
        }
    }

    #[test]
    fn rate_limited_delay_exceeds_ordinary_backoff() {
        let policy = RetryPolicy::for_push();
        for attempt in 1..=6 {
            let limited = policy.rate_limited_delay(attempt, None);
            assert!(limited > policy.ceiling(attempt));
        }
        let server = Duration::from_secs(300);
        assert_eq!(policy.rate_limited_delay(1, Some(server)), server);
    }
}
