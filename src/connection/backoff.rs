use rand::Rng;
use std::time::Duration;

/// Exponential reconnect delay with optional jitter, capped at `max_delay`.
///
/// There is no attempt limit: the push session retries forever.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts: 0,
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Delay before the next attempt, never above `max_delay`.
    pub fn next_delay(&self) -> Duration {
        let multiplier = 2u32.saturating_pow(self.attempts.min(31));
        let delay = self
            .base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay);

        if !self.jitter || delay.is_zero() {
            return delay;
        }

        // Up to +50% of the computed delay, still clamped to the maximum.
        let spread = delay.as_millis() as u64 / 2;
        let extra = rand::thread_rng().gen_range(0..=spread);
        (delay + Duration::from_millis(extra)).min(self.max_delay)
    }

    pub fn bump(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_exponentially_to_max() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10));
        let mut delays = Vec::new();
        for _ in 0..6 {
            delays.push(backoff.next_delay().as_secs());
            backoff.bump();
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
        assert_eq!(backoff.attempts(), 6);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_bounded_after_many_attempts() {
        let max = Duration::from_secs(10);
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), max).with_jitter(true);
        for _ in 0..1_000 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= max);
            backoff.bump();
        }
        assert_eq!(backoff.attempts(), 1_000);
    }

    #[test]
    fn test_max_below_base_is_raised() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
    }
}
