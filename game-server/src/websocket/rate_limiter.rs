use std::time::{Duration, Instant};

/// Per-connection token bucket. Typing games are keystroke-heavy, so the
/// bucket is sized for sustained fast typing plus control traffic; only a
/// flooding client runs it dry.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: f64,
    max_tokens: f64,
    tokens_per_second: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        // 25 msgs/s sustained with a burst headroom of 60.
        Self::new_with_limits(60, 25.0)
    }

    pub fn new_with_limits(max_tokens: u32, tokens_per_second: f64) -> Self {
        Self {
            tokens: max_tokens as f64,
            max_tokens: max_tokens as f64,
            tokens_per_second,
            last_refill: Instant::now(),
        }
    }

    pub fn check_rate_limit(&mut self) -> bool {
        self.refill_tokens();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill_tokens(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.tokens_per_second).min(self.max_tokens);
        self.last_refill = now;
    }

    pub fn remaining_tokens(&mut self) -> u32 {
        self.refill_tokens();
        self.tokens as u32
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_up_to_bucket_size() {
        let mut limiter = RateLimiter::new_with_limits(5, 1.0);
        for _ in 0..5 {
            assert!(limiter.check_rate_limit());
        }
        assert!(!limiter.check_rate_limit());
    }

    #[test]
    fn test_tokens_refill_over_time() {
        let mut limiter = RateLimiter::new_with_limits(2, 100.0);
        assert!(limiter.check_rate_limit());
        assert!(limiter.check_rate_limit());
        assert!(!limiter.check_rate_limit());

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check_rate_limit());
    }

    #[test]
    fn test_refill_caps_at_max() {
        let mut limiter = RateLimiter::new_with_limits(3, 1000.0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.remaining_tokens(), 3);
    }
}
