// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! [`FrameChain`]: an ordered sequence of frames.
//!
//! Chains are how multi-buffer payloads travel between stages without being
//! flattened: a demuxer can emit one chain per access unit and the consumer
//! decides whether to walk it or [`FrameChain::gather`] it into one frame.

use std::collections::VecDeque;

use crate::frame::Frame;
use crate::Ticks;

/// Aggregate properties of a chain, computed in one walk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainProperties {
    /// Number of frames in the chain.
    pub count: usize,
    /// Sum of all payload lengths, in bytes.
    pub size: usize,
    /// Sum of all known frame durations.
    pub duration: Ticks,
}

/// An ordered sequence of [`Frame`]s with O(1) append at the tail.
#[derive(Debug, Default)]
pub struct FrameChain {
    frames: VecDeque<Frame>,
}

impl FrameChain {
    pub fn new() -> FrameChain {
        FrameChain::default()
    }

    pub fn from(frame: Frame) -> FrameChain {
        let mut chain = FrameChain::new();
        chain.push(frame);
        chain
    }

    /// Appends one frame at the tail.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// Moves every frame of `other` to the tail, preserving order.
    pub fn append(&mut self, other: &mut FrameChain) {
        self.frames.append(&mut other.frames);
    }

    /// Detaches and returns the head frame.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn front(&self) -> Option<&Frame> {
        self.frames.front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Drops every frame in the chain.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Computes count, total byte size and total known duration in a single
    /// walk.
    pub fn properties(&self) -> ChainProperties {
        let mut props = ChainProperties::default();
        for frame in &self.frames {
            props.count += 1;
            props.size += frame.len();
            if let Some(duration) = frame.duration {
                props.duration += duration;
            }
        }
        props
    }

    /// Copies consecutive payload bytes into `dest` until either the chain
    /// or `dest` runs out. Returns the number of bytes copied; the chain is
    /// left untouched.
    pub fn extract(&self, dest: &mut [u8]) -> usize {
        let mut copied = 0;
        for frame in &self.frames {
            let room = dest.len() - copied;
            if room == 0 {
                break;
            }
            let take = std::cmp::min(room, frame.len());
            dest[copied..copied + take].copy_from_slice(&frame.payload()[..take]);
            copied += take;
        }
        copied
    }

    /// Collapses the chain into a single frame holding the concatenation of
    /// every payload.
    ///
    /// A single-frame chain is returned as-is, with no allocation or copy,
    /// which makes gathering an already-gathered result a no-op. The output
    /// frame takes its flags, pts and dts from the first frame and its
    /// duration from the aggregate. Returns `None` on an empty chain.
    pub fn gather(mut self) -> Option<Frame> {
        if self.frames.len() == 1 {
            return self.frames.pop_front();
        }

        let props = self.properties();
        let first = self.frames.front()?;

        let mut out = Frame::alloc(props.size);
        out.flags = first.flags;
        out.pts = first.pts;
        out.dts = first.dts;
        if props.duration != Ticks(0) {
            out.duration = Some(props.duration);
        }

        let copied = self.extract(out.payload_mut());
        debug_assert_eq!(copied, props.size);

        Some(out)
    }
}

impl IntoIterator for FrameChain {
    type Item = Frame;
    type IntoIter = std::collections::vec_deque::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl FromIterator<Frame> for FrameChain {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> FrameChain {
        FrameChain {
            frames: iter.into_iter().collect(),
        }
    }
}

impl Extend<Frame> for FrameChain {
    fn extend<I: IntoIterator<Item = Frame>>(&mut self, iter: I) {
        self.frames.extend(iter);
    }
}
