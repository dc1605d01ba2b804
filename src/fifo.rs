// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! [`FrameFifo`]: the inter-thread frame queue.
//!
//! This is the one genuinely concurrent primitive of the crate. A single
//! mutex protects the queued chain and its counters; the condition variable
//! carries no data of its own, it is purely a wakeup signal and waiters
//! re-check the queue state themselves.
//!
//! The lock is exposed as an RAII guard, [`FifoGuard`]. Because
//! [`FifoGuard::wait`] reacquires the lock before returning, any cleanup
//! running after a blocking call observes the lock held, including on
//! unwinding.

use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::chain::FrameChain;
use crate::frame::Frame;

#[derive(Debug, Default)]
struct FifoState {
    chain: FrameChain,
    /// Sum of queued payload bytes. Maintained, with the lock held, by every
    /// queue/dequeue operation so reading it is O(1).
    bytes: usize,
}

/// A thread-safe FIFO of frames.
///
/// All operations are non-blocking except [`FrameFifo::get`] and
/// [`FifoGuard::wait`]. Mutex poisoning is treated as fatal, consistent
/// with the buffer layer treating failure of small control structures as
/// unrecoverable.
#[derive(Debug, Default)]
pub struct FrameFifo {
    state: Mutex<FifoState>,
    wake: Condvar,
}

/// Exclusive access to a [`FrameFifo`].
///
/// Dropping the guard unlocks the FIFO. Locking the same FIFO again from
/// the same thread while a guard is alive deadlocks; locking several FIFOs
/// at once risks lock-order inversion and is the caller's burden to avoid.
pub struct FifoGuard<'a> {
    state: MutexGuard<'a, FifoState>,
    fifo: &'a FrameFifo,
}

impl FrameFifo {
    pub fn new() -> FrameFifo {
        FrameFifo::default()
    }

    /// Takes the lock.
    pub fn lock(&self) -> FifoGuard<'_> {
        FifoGuard {
            state: self.state.lock().unwrap(),
            fifo: self,
        }
    }

    /// Queues a frame and wakes one blocked [`FrameFifo::get`], if any.
    pub fn put(&self, frame: Frame) {
        self.put_chain(FrameChain::from(frame));
    }

    /// Queues a whole chain at once, preserving its internal order.
    pub fn put_chain(&self, chain: FrameChain) {
        self.lock().queue(chain);
    }

    /// Dequeues the head frame, blocking until one is available.
    pub fn get(&self) -> Frame {
        let mut guard = self.lock();
        loop {
            if let Some(frame) = guard.dequeue() {
                return frame;
            }
            guard = guard.wait();
        }
    }

    /// Discards everything currently queued.
    pub fn clear(&self) {
        // Dropping the chain outside the lock keeps frame release out of the
        // critical section.
        let chain = self.lock().dequeue_all();
        drop(chain);
    }
}

impl<'a> FifoGuard<'a> {
    /// Atomically releases the lock and blocks until signaled, then
    /// reacquires the lock before returning. Wakeups may be spurious; the
    /// caller re-checks the queue state.
    pub fn wait(self) -> FifoGuard<'a> {
        let FifoGuard { state, fifo } = self;
        FifoGuard {
            state: fifo.wake.wait(state).unwrap(),
            fifo,
        }
    }

    /// Wakes one waiter, if any is blocked in [`FifoGuard::wait`].
    ///
    /// Signaling is deliberately only reachable through the guard, so every
    /// wakeup is sent with the lock held and cannot race a waiter between
    /// its queue check and its block. There is no lock-free variant.
    pub fn signal(&self) {
        self.fifo.wake.notify_one();
    }

    /// Appends `chain` at the tail and wakes one waiter. An empty chain is
    /// a no-op.
    pub fn queue(&mut self, mut chain: FrameChain) {
        if chain.is_empty() {
            return;
        }
        self.state.bytes += chain.iter().map(|f| f.len()).sum::<usize>();
        self.state.chain.append(&mut chain);
        self.signal();
    }

    /// Detaches and returns the head frame, if any. O(1).
    pub fn dequeue(&mut self) -> Option<Frame> {
        let frame = self.state.chain.pop()?;
        self.state.bytes -= frame.len();
        Some(frame)
    }

    /// Detaches the entire queued chain at once, leaving the FIFO empty.
    /// O(1), cheaper than dequeueing frame by frame.
    pub fn dequeue_all(&mut self) -> FrameChain {
        self.state.bytes = 0;
        std::mem::take(&mut self.state.chain)
    }

    /// A view of the head frame without dequeueing it.
    pub fn peek(&self) -> Option<&Frame> {
        self.state.chain.front()
    }

    /// Number of queued frames. O(1).
    pub fn count(&self) -> usize {
        self.state.chain.len()
    }

    /// Sum of queued payload bytes. O(1).
    pub fn bytes(&self) -> usize {
        self.state.bytes
    }
}
