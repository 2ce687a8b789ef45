// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-rate token bucket for read sessions.
//!
//! Tokens refill linearly at the configured rate, capped at one second worth
//! of bytes. A grant consumes every token up to the size of the granted item:
//! credit saved while idle never pays for more than one item, so any
//! one-second window carries at most the rate plus one item.
//! A rate of 0 disables limiting entirely.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct TokenBucket {
    /// Current token count (in bytes).
    tokens: u64,

    /// Maximum token capacity; equals `rate_bps`.
    capacity: u64,

    /// Refill rate in bytes per second (0 = unconstrained).
    rate_bps: u32,

    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket for `rate_bps` bytes per second.
    pub fn new(rate_bps: u32) -> Self {
        Self {
            tokens: u64::from(rate_bps),
            capacity: u64::from(rate_bps),
            rate_bps,
            last_refill: Instant::now(),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.rate_bps == 0
    }

    /// Try to take `bytes` tokens.
    ///
    /// Refills once if the current count is short. An item larger than the
    /// capacity is granted only when the bucket is full. A granted item
    /// always leaves the bucket empty.
    pub fn get_tokens(&mut self, bytes: u64) -> bool {
        if self.is_unconstrained() {
            return true;
        }
        if self.take(bytes) {
            return true;
        }
        self.refill();
        self.take(bytes)
    }

    /// Time until a `get_tokens(bytes)` call would succeed.
    ///
    /// Returns `Duration::ZERO` if already available.
    pub fn time_until_available(&mut self, bytes: u64) -> Duration {
        if self.is_unconstrained() {
            return Duration::ZERO;
        }
        self.refill();
        // Oversized items only need a full bucket.
        let needed = bytes.min(self.capacity);
        if self.tokens >= needed {
            return Duration::ZERO;
        }
        let missing = needed - self.tokens;
        Duration::from_secs_f64(missing as f64 / f64::from(self.rate_bps))
    }

    /// Get current token count after refilling.
    pub fn tokens(&mut self) -> u64 {
        self.refill();
        self.tokens
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn rate(&self) -> u32 {
        self.rate_bps
    }

    fn take(&mut self, bytes: u64) -> bool {
        let needed = bytes.min(self.capacity);
        if self.tokens >= needed {
            self.tokens = 0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);

        if elapsed.is_zero() {
            return;
        }

        let add = (elapsed.as_secs_f64() * f64::from(self.rate_bps)) as u64;

        if add > 0 {
            self.tokens = (self.tokens + add).min(self.capacity);
            self.last_refill = now;
        }
    }
}
