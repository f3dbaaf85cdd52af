use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use crate::error::{Error, Result};

// Absorbs float rounding between a computed wait and the refill it buys.
const REFILL_EPSILON: f64 = 1e-9;

/// Token bucket with lazy, time-based refill.
///
/// All state lives behind one mutex. A blocking [`consume`](TokenBucket::consume) computes its
/// wait under the lock, sleeps without it, then retries exactly once.
pub struct TokenBucket {
    capacity: u32,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant, capacity: f64, refill_rate: f64) {
        // saturating: an older `now` never drains tokens or rewinds the clock
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = f64::min(capacity, self.tokens + elapsed * refill_rate.max(0.0));
            self.last_refill = now;
        }
    }

    fn take(&mut self, tokens: f64) -> bool {
        if self.tokens + REFILL_EPSILON >= tokens {
            self.tokens = (self.tokens - tokens).max(0.0);
            true
        } else {
            false
        }
    }
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        TokenBucket {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bucket that refills its full capacity once per `window`.
    pub fn from_window(capacity: u32, window: Duration) -> Self {
        let secs = window.as_secs_f64();
        let rate = if secs > 0.0 { capacity as f64 / secs } else { 0.0 };
        Self::new(capacity, rate)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Tokens available right now (after refill).
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        state.refill(Instant::now(), self.capacity as f64, self.refill_rate);
        state.tokens
    }

    /// Non-blocking consumption.
    pub fn try_consume(&self, tokens: u32) -> Result<bool> {
        self.try_consume_at(tokens, Instant::now())
    }

    pub(crate) fn try_consume_at(&self, tokens: u32, now: Instant) -> Result<bool> {
        self.check_capacity(tokens)?;
        let mut state = self.state.lock();
        state.refill(now, self.capacity as f64, self.refill_rate);
        Ok(state.take(tokens as f64))
    }

    /// Consume `tokens`, optionally waiting for the refill.
    ///
    /// Returns `Ok(false)` when not blocking and short, or when still short after the single
    /// computed wait. Requesting more than the capacity is an error, never a wait.
    pub async fn consume(&self, tokens: u32, blocking: bool) -> Result<bool> {
        self.check_capacity(tokens)?;

        let wait = {
            let mut state = self.state.lock();
            state.refill(Instant::now(), self.capacity as f64, self.refill_rate);

            if state.take(tokens as f64) {
                tracing::trace!(tokens, remaining = state.tokens, "Tokens consumed");
                return Ok(true);
            }

            if !blocking || self.refill_rate <= 0.0 {
                tracing::debug!(
                    tokens,
                    available = state.tokens,
                    "Insufficient tokens"
                );
                return Ok(false);
            }

            Duration::from_secs_f64((tokens as f64 - state.tokens) / self.refill_rate)
        };

        tracing::warn!(
            tokens,
            wait_ms = wait.as_millis() as u64,
            "Rate limit: waiting for tokens"
        );
        tokio::time::sleep(wait).await;

        let mut state = self.state.lock();
        state.refill(Instant::now(), self.capacity as f64, self.refill_rate);
        if state.take(tokens as f64) {
            Ok(true)
        } else {
            tracing::error!(tokens, available = state.tokens, "Failed to consume tokens after waiting");
            Ok(false)
        }
    }

    fn check_capacity(&self, tokens: u32) -> Result<()> {
        if tokens > self.capacity {
            return Err(Error::ExceedsCapacity {
                requested: tokens,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .finish()
    }
}
