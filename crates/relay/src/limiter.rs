// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session token bucket. Tokens are **bits**, not bytes: a websocket
//! message of `n` bytes costs `8 × n` tokens.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Sustained rate granted to each remote-controller session, in bits/second.
pub const SESSION_RATE_BITS_PER_SECOND: u64 = 500_000;
/// Burst capacity granted to each remote-controller session, in bits.
pub const SESSION_BURST_BITS: u64 = 10_000_000;

/// Token bucket refilled from monotonic clock deltas.
///
/// The bucket starts full. `allow_n` never blocks; a refused call consumes
/// nothing. A plain mutex guards the whole refill-then-consume step so that
/// concurrent callers cannot skip each other's refills.
pub struct RateLimiter {
    rate_per_second: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(rate_per_second: u64, burst: u64) -> Self {
        Self {
            rate_per_second: rate_per_second as f64,
            burst: burst as f64,
            bucket: Mutex::new(Bucket { tokens: burst as f64, last_refill: Instant::now() }),
        }
    }

    /// Consume `n` tokens at the current instant.
    pub fn allow(&self, n: u64) -> bool {
        self.allow_n(Instant::now(), n)
    }

    /// Refill from the elapsed time since the last update, capped at `burst`,
    /// then atomically consume `n` tokens. Returns false (consuming nothing)
    /// when fewer than `n` tokens are available.
    pub fn allow_n(&self, now: Instant, n: u64) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        if now > bucket.last_refill {
            let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens = (bucket.tokens + elapsed * self.rate_per_second).min(self.burst);
            bucket.last_refill = now;
        }
        let needed = n as f64;
        if bucket.tokens < needed {
            return false;
        }
        bucket.tokens -= needed;
        true
    }
}

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod tests;
