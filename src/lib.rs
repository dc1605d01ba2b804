// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Data-flow primitives for media pipelines.
//!
//! This crate provides the buffer types that move compressed and decoded
//! samples between pipeline stages:
//!
//! * [`frame::Frame`], a zero-copy binary buffer with a payload view into a
//!   polymorphic backing store, timing metadata and ancillary attachments.
//! * [`chain::FrameChain`], an ordered sequence of frames with cheap append
//!   and a gather-into-one-frame operation.
//! * [`fifo::FrameFifo`], the mutex/condvar queue used to hand frames
//!   between threads.
//! * [`dpb::Dpb`], the decoded picture buffer reorder engine turning decode
//!   order into display order.

pub mod chain;
pub mod clock;
pub mod dpb;
pub mod fifo;
pub mod frame;

use std::ops::Add;
use std::ops::AddAssign;
use std::ops::Sub;

/// Number of [`Ticks`] in one second.
pub const CLOCK_FREQ: i64 = 1_000_000;

/// A timestamp or duration, in microsecond ticks.
///
/// An unknown timestamp is represented as `Option::<Ticks>::None`, never as
/// zero: zero is a perfectly valid instant at the start of a stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(pub i64);

impl Ticks {
    /// Whole seconds, converted to ticks.
    pub const fn from_secs(secs: i64) -> Ticks {
        Ticks(secs * CLOCK_FREQ)
    }
}

impl Add for Ticks {
    type Output = Ticks;

    fn add(self, rhs: Ticks) -> Ticks {
        Ticks(self.0 + rhs.0)
    }
}

impl AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Ticks) {
        self.0 += rhs.0;
    }
}

impl Sub for Ticks {
    type Output = Ticks;

    fn sub(self, rhs: Ticks) -> Ticks {
        Ticks(self.0 - rhs.0)
    }
}

/// A rational frame or field rate, in periods per second.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClockRate {
    pub num: u32,
    pub den: u32,
}

impl ClockRate {
    pub const fn new(num: u32, den: u32) -> ClockRate {
        ClockRate { num, den }
    }

    /// Both terms must be nonzero for the rate to be usable.
    pub fn is_valid(&self) -> bool {
        self.num != 0 && self.den != 0
    }
}
