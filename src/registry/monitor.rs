//! Sync monitor
//!
//! One mutex and one condition variable guard everything the producer and
//! the consumers share: the frame ring, the sequence counter, the consumer
//! registry and the closed flag.
//!
//! ```text
//!   producer                         consumer "a"          consumer "b"
//!   publish(frame)                   wait_for_frame()      wait_for_frame()
//!     lock                             lock                  lock
//!     ring.write(seq)                  while !pending(a)     while !pending(b)
//!     seq += 1                           cond.wait             cond.wait
//!     mark_all_pending  ── notify_all ──►  take flag             take flag
//!     unlock                           ring.read_back        ring.read_back
//! ```
//!
//! The lock is only held for flag and pointer bookkeeping. Decoding happens
//! before `publish` and diagnostics after it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::consumer::{ConsumerRegistry, Unregistered};
use crate::buffer::FrameRing;
use crate::decoder::error::{DecoderError, Result};
use crate::frame::FrameHandle;

/// Outcome of a frame request
#[derive(Debug, Clone)]
pub enum Delivery {
    /// A frame and the number of frames produced when it was read
    Frame { sequence: u64, frame: FrameHandle },
    /// No frame at the requested offset yet; try again after the next frame
    Repeat,
}

impl Delivery {
    /// Check if this is a repeat signal
    pub fn is_repeat(&self) -> bool {
        matches!(self, Delivery::Repeat)
    }

    /// Get the frame, if any
    pub fn into_frame(self) -> Option<(u64, FrameHandle)> {
        match self {
            Delivery::Frame { sequence, frame } => Some((sequence, frame)),
            Delivery::Repeat => None,
        }
    }
}

/// Point-in-time view of the shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSnapshot {
    /// Frames produced so far
    pub sequence: u64,
    /// Known consumers
    pub consumers: usize,
    /// Slots holding a frame
    pub occupied_slots: usize,
    /// Ring capacity
    pub capacity: usize,
    /// Whether shutdown was broadcast
    pub closed: bool,
}

const HANDOFF_WAITING: u8 = 0;
const HANDOFF_DONE: u8 = 1;
const HANDOFF_ABANDONED: u8 = 2;

/// Hand-off state of one abandonable wait
///
/// Lets a waiter on another thread learn that its receiver went away, and
/// lets the receiver put back a signal the waiter took but never passed on.
/// Only read or written under the monitor lock.
#[derive(Debug, Default)]
pub struct WaitHandoff {
    state: AtomicU8,
}

impl WaitHandoff {
    /// Create a handoff for a wait that has not started yet
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self) -> u8 {
        self.state.load(Ordering::Relaxed)
    }

    fn set(&self, state: u8) {
        self.state.store(state, Ordering::Relaxed);
    }
}

struct SharedState {
    ring: FrameRing,
    sequence: u64,
    consumers: ConsumerRegistry,
    closed: bool,
}

/// Mutex + condvar coordinating one producer and many consumers
pub struct SyncMonitor {
    state: Mutex<SharedState>,
    ready: Condvar,
}

impl SyncMonitor {
    /// Create a monitor around an empty ring of `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(SharedState {
                ring: FrameRing::new(capacity),
                sequence: 0,
                consumers: ConsumerRegistry::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Store a decoded frame and wake every consumer
    ///
    /// Returns the new sequence counter, or `None` if the monitor was closed
    /// (the frame is released without touching the ring).
    pub fn publish(&self, frame: FrameHandle) -> Option<u64> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }

        let sequence = state.sequence;
        state.ring.write(sequence, frame);
        state.sequence = sequence + 1;
        state.consumers.mark_all_pending();
        self.ready.notify_all();

        Some(state.sequence)
    }

    /// Block until `consumer` has a pending frame, then read at `offset`
    ///
    /// Unseen identities are registered on the spot and wait for the next
    /// publish. With a deadline, returns `Timeout` once it passes.
    pub fn wait_for_frame(
        &self,
        consumer: &str,
        offset: i64,
        deadline: Option<Instant>,
    ) -> Result<Delivery> {
        self.wait(consumer, offset, deadline, None)
    }

    /// Like [`SyncMonitor::wait_for_frame`], giving up once `handoff` is abandoned
    ///
    /// A successful return marks the handoff done under the lock, so a later
    /// [`SyncMonitor::abandon`] knows the taken signal has to be put back.
    pub fn wait_with_handoff(
        &self,
        consumer: &str,
        offset: i64,
        handoff: &WaitHandoff,
    ) -> Result<Delivery> {
        self.wait(consumer, offset, None, Some(handoff))
    }

    /// Give up a wait started with [`SyncMonitor::wait_with_handoff`]
    ///
    /// A waiter still blocked returns `Cancelled` without taking a signal.
    /// If the waiter already took one, it is restored for `consumer`.
    pub fn abandon(&self, consumer: &str, handoff: &WaitHandoff) {
        let mut state = self.state.lock();
        match handoff.get() {
            HANDOFF_WAITING => {
                handoff.set(HANDOFF_ABANDONED);
                self.ready.notify_all();
            }
            HANDOFF_DONE => {
                handoff.set(HANDOFF_ABANDONED);
                if state.consumers.rearm(consumer) {
                    tracing::debug!(consumer = consumer, "Restored undelivered frame signal");
                }
            }
            _ => {}
        }
    }

    fn wait(
        &self,
        consumer: &str,
        offset: i64,
        deadline: Option<Instant>,
        handoff: Option<&WaitHandoff>,
    ) -> Result<Delivery> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DecoderError::Closed);
        }

        state.consumers.ensure(consumer);

        loop {
            if state.closed {
                return Err(DecoderError::Closed);
            }
            if handoff.is_some_and(|h| h.get() == HANDOFF_ABANDONED) {
                return Err(DecoderError::Cancelled);
            }

            match state.consumers.take_pending(consumer) {
                None => return Err(DecoderError::ConsumerUnregistered(consumer.to_string())),
                Some(true) => break,
                Some(false) => {}
            }

            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(DecoderError::Timeout);
                    }
                    let _ = self.ready.wait_until(&mut state, deadline);
                }
                None => self.ready.wait(&mut state),
            }
        }

        let sequence = state.sequence;
        let delivery = match state.ring.read_back(sequence, offset) {
            Some(frame) => Delivery::Frame { sequence, frame },
            None => Delivery::Repeat,
        };
        if let Some(handoff) = handoff {
            handoff.set(HANDOFF_DONE);
        }
        Ok(delivery)
    }

    /// Create an uncounted entry for an unseen `consumer`
    ///
    /// Returns true if the entry was created by this call.
    pub fn ensure(&self, consumer: &str) -> Result<bool> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DecoderError::Closed);
        }
        Ok(state.consumers.ensure(consumer))
    }

    /// Add a registration for `consumer`
    ///
    /// Returns true if the identity was new.
    pub fn register(&self, consumer: &str) -> Result<bool> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DecoderError::Closed);
        }
        Ok(state.consumers.register(consumer))
    }

    /// Drop a registration for `consumer`
    ///
    /// Wakes waiters so a consumer blocked under a removed identity returns.
    pub fn unregister(&self, consumer: &str) -> Unregistered {
        let mut state = self.state.lock();
        let result = state.consumers.unregister(consumer);
        if result == Unregistered::Removed {
            self.ready.notify_all();
        }
        result
    }

    /// Broadcast shutdown, release all frames and forget all consumers
    ///
    /// Returns false if the monitor was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }

        state.closed = true;
        state.ring.clear();
        state.consumers.clear();
        self.ready.notify_all();
        true
    }

    /// Frames produced so far
    pub fn sequence(&self) -> u64 {
        self.state.lock().sequence
    }

    /// Check if shutdown was broadcast
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Check if `consumer` is known
    pub fn has_consumer(&self, consumer: &str) -> bool {
        self.state.lock().consumers.contains(consumer)
    }

    /// Capture counters under one lock
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state.lock();
        MonitorSnapshot {
            sequence: state.sequence,
            consumers: state.consumers.len(),
            occupied_slots: state.ring.occupied(),
            capacity: state.ring.capacity(),
            closed: state.closed,
        }
    }
}
