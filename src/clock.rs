// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! [`OutputClock`]: a rational-rate timestamp interpolator.
//!
//! The reorder engine uses it to synthesize presentation timestamps for
//! pictures that carry none: the clock is seeded from the last known
//! timestamp and advanced by whole periods of the configured rate, carrying
//! the sub-tick remainder so long runs do not drift.

use crate::ClockRate;
use crate::Ticks;
use crate::CLOCK_FREQ;

#[derive(Clone, Debug)]
pub struct OutputClock {
    rate: ClockRate,
    value: Option<Ticks>,
    /// Sub-tick residue of the last increment, in units of 1/`rate.num`
    /// ticks.
    remainder: u64,
}

impl OutputClock {
    /// Creates a clock with the given rate and no tracked value yet.
    ///
    /// Panics if `rate` is invalid; callers fall back to a default rate
    /// rather than constructing an unusable clock.
    pub fn new(rate: ClockRate) -> OutputClock {
        assert!(rate.is_valid());
        OutputClock {
            rate,
            value: None,
            remainder: 0,
        }
    }

    pub fn rate(&self) -> ClockRate {
        self.rate
    }

    pub fn get(&self) -> Option<Ticks> {
        self.value
    }

    /// Sets the tracked value, discarding any accumulated remainder.
    pub fn set(&mut self, value: Ticks) {
        self.value = Some(value);
        self.remainder = 0;
    }

    /// Replaces the rate, keeping the tracked value.
    ///
    /// Panics if `rate` is invalid.
    pub fn reset_rate(&mut self, rate: ClockRate) {
        assert!(rate.is_valid());
        self.rate = rate;
        self.remainder = 0;
    }

    /// Advances the tracked value by `count` periods of the rate, carrying
    /// the remainder. A no-op when the clock was never seeded.
    pub fn increment(&mut self, count: u32) -> Option<Ticks> {
        let value = self.value?;
        let num = u64::from(self.rate.num);
        let total = CLOCK_FREQ as u64 * u64::from(count) * u64::from(self.rate.den)
            + self.remainder;
        let next = Ticks(value.0 + (total / num) as i64);
        self.remainder = total % num;
        self.value = Some(next);
        Some(next)
    }
}
