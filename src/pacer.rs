/*
 *  pacer.rs
 *
 *  ambidash - always-on glance board
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use std::time::{Duration, Instant};

#[inline]
fn frame_for(fps: u32) -> Duration {
    Duration::from_micros((1_000_000u32 / fps.max(1)) as u64)
}

/// Deadline based frame gate for the display loop.
pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
}

impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        Self { next_deadline: Instant::now(), frame: frame_for(target_fps) }
    }

    /// Returns true if a tick is due; if true, it also schedules the next deadline.
    #[inline]
    pub fn should_tick(&mut self) -> bool {
        self.should_tick_at(Instant::now())
    }

    fn should_tick_at(&mut self, now: Instant) -> bool {
        if now >= self.next_deadline {
            self.next_deadline = now + self.frame;
            true
        } else {
            false
        }
    }

    /// How long the loop may sleep before the next tick is due.
    pub fn until_next(&self) -> Duration {
        self.next_deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_length() {
        assert_eq!(Pacer::new(60).frame, Duration::from_micros(16_666));
        assert_eq!(Pacer::new(0).frame, Duration::from_secs(1));
        assert_eq!(Pacer::new(30).frame, Duration::from_micros(33_333));
    }

    #[test]
    fn test_one_tick_per_frame() {
        let mut p = Pacer::new(10);
        let t0 = Instant::now();
        assert!(p.should_tick_at(t0));
        assert!(!p.should_tick_at(t0 + Duration::from_millis(50)));
        assert!(!p.should_tick_at(t0 + Duration::from_millis(99)));
        assert!(p.should_tick_at(t0 + Duration::from_millis(100)));
        assert!(!p.should_tick_at(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn test_first_call_ticks_immediately() {
        let mut p = Pacer::new(60);
        assert!(p.should_tick());
        assert!(p.until_next() <= p.frame);
    }
}
