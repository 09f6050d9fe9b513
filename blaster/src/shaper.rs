use core::time::Duration;
use std::time::Instant;

/// A token-bucket shaper implementation.
///
/// Tokens accumulate at the given rate and are capped at one second worth of
/// them, so a stalled consumer gets a bounded burst, not an unbounded one.
#[derive(Debug)]
pub struct Shaper {
    /// Tokens per second.
    rate: f64,
    tokens: f64,
    prev_ts: Instant,
}

impl Shaper {
    pub fn new(rate: f64) -> Self {
        Self::new_at(rate, Instant::now())
    }

    pub fn new_at(rate: f64, now: Instant) -> Self {
        Self { rate, tokens: 0.0, prev_ts: now }
    }

    /// Returns the number of tokens available to consume.
    #[inline]
    pub fn tick(&mut self) -> u64 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.prev_ts);

        self.tokens += self.rate * elapsed.as_secs_f64();
        self.tokens = self.tokens.min(self.rate.max(1.0));
        self.prev_ts = now;

        self.tokens as u64
    }

    /// Consume specified amount of tokens.
    ///
    /// Must be called after actual token consumption (i.e. issuing tickets)
    /// to maintain this shaper.
    #[inline]
    pub fn consume(&mut self, num: u64) {
        self.tokens -= num as f64;
    }

    /// Returns how long to wait until the next whole token is available.
    #[inline]
    pub fn delay(&self) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }

        Duration::try_from_secs_f64((1.0 - self.tokens) / self.rate).unwrap_or(Duration::MAX)
    }
}
