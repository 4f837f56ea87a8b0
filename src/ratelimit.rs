/*
 *  ratelimit.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  Cooldown gate shared by every data source
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
//! Minimum-interval gate. Times are wall-clock epoch seconds as `f64`.

use std::sync::atomic::{AtomicU64, Ordering};
use chrono::Utc;

/// Nothing may poll faster than this, whatever the config says.
pub const MIN_INTERVAL_FLOOR_SECS: f64 = 1.0;

/// Sentinel for "never fired", so the first acquire always opens.
const NEVER: f64 = f64::NEG_INFINITY;

/// Wall clock as fractional epoch seconds, the time base for every gate.
pub fn epoch_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[derive(Debug)]
pub struct RateLimiter {
    min_interval_secs: f64,
    // f64 bits; swapped with compare_exchange so check-and-stamp is one step
    last_fire: AtomicU64,
}

impl RateLimiter {
    /// `floor_secs` is the provider minimum; the global floor always applies.
    pub fn new(min_interval_secs: f64, floor_secs: f64) -> Self {
        let floor = floor_secs.max(MIN_INTERVAL_FLOOR_SECS);
        let min_interval_secs = if min_interval_secs.is_finite() {
            min_interval_secs.max(floor)
        } else {
            floor
        };
        Self {
            min_interval_secs,
            last_fire: AtomicU64::new(NEVER.to_bits()),
        }
    }

    /// Convenience for config values given in minutes.
    pub fn from_minutes(minutes: f64, floor_secs: f64) -> Self {
        Self::new(minutes * 60.0, floor_secs)
    }

    #[inline]
    pub fn min_interval_secs(&self) -> f64 {
        self.min_interval_secs
    }

    /// Last successful acquire, `None` until the gate has opened once.
    pub fn last_fire(&self) -> Option<f64> {
        let t = f64::from_bits(self.last_fire.load(Ordering::Acquire));
        t.is_finite().then_some(t)
    }

    /// Returns true, and stamps `now`, only when the cooldown has elapsed.
    /// Concurrent callers inside one window: exactly one wins.
    pub fn try_acquire(&self, now: f64) -> bool {
        if !now.is_finite() {
            return false;
        }
        let mut current = self.last_fire.load(Ordering::Acquire);
        loop {
            let last = f64::from_bits(current);
            if now - last < self.min_interval_secs {
                return false;
            }
            match self.last_fire.compare_exchange_weak(
                current,
                now.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Seconds until the gate would open again; zero when open.
    pub fn remaining(&self, now: f64) -> f64 {
        match self.last_fire() {
            Some(last) => (self.min_interval_secs - (now - last)).max(0.0),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    const EPS: f64 = 1e-3;

    #[test]
    fn test_window_boundaries() {
        for min in [1.0, 60.0, 300.0, 3600.0] {
            let t = 1_700_000_000.0;

            let rl = RateLimiter::new(min, 1.0);
            assert!(rl.try_acquire(t));
            assert!(!rl.try_acquire(t + min - EPS));

            let rl = RateLimiter::new(min, 1.0);
            assert!(rl.try_acquire(t));
            assert!(rl.try_acquire(t + min + EPS));
        }
    }

    #[test]
    fn test_rejected_call_leaves_stamp() {
        let rl = RateLimiter::new(60.0, 1.0);
        assert!(rl.try_acquire(100.0));
        assert!(!rl.try_acquire(130.0));
        assert_eq!(rl.last_fire(), Some(100.0));
        assert!((rl.remaining(130.0) - 30.0).abs() < 1e-9);
        assert!(rl.try_acquire(160.0));
        assert_eq!(rl.last_fire(), Some(160.0));
    }

    #[test]
    fn test_clock_stepping_back_is_rejected() {
        let rl = RateLimiter::new(10.0, 1.0);
        assert!(rl.try_acquire(1000.0));
        assert!(!rl.try_acquire(500.0));
        assert_eq!(rl.last_fire(), Some(1000.0));
    }

    #[test]
    fn test_floor_clamping() {
        assert_eq!(RateLimiter::new(0.0, 0.0).min_interval_secs(), 1.0);
        assert_eq!(RateLimiter::new(-5.0, 1.0).min_interval_secs(), 1.0);
        assert_eq!(RateLimiter::new(30.0, 60.0).min_interval_secs(), 60.0);
        assert_eq!(RateLimiter::new(f64::NAN, 60.0).min_interval_secs(), 60.0);
        assert_eq!(RateLimiter::from_minutes(5.0, 60.0).min_interval_secs(), 300.0);
    }

    #[test]
    fn test_first_acquire_always_opens() {
        let rl = RateLimiter::new(3600.0, 60.0);
        assert_eq!(rl.last_fire(), None);
        assert_eq!(rl.remaining(0.0), 0.0);
        assert!(rl.try_acquire(0.0));
    }

    #[test]
    fn test_concurrent_single_winner() {
        const N: usize = 32;
        let rl = Arc::new(RateLimiter::new(60.0, 1.0));
        let barrier = Arc::new(Barrier::new(N));
        let now = 1_700_000_000.0;

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let rl = Arc::clone(&rl);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    rl.try_acquire(now)
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }
}
