//! Consumer registry and producer/consumer synchronization
//!
//! The registry tracks which consumers still have an undelivered frame. The
//! sync monitor pairs it with the frame ring behind one mutex and one
//! condition variable.
//!
//! # Delivery protocol
//!
//! ```text
//!                 SyncMonitor (Mutex + Condvar)
//!          ┌─────────────────────────────────────┐
//!          │ ring: FrameRing                     │
//!          │ sequence: u64                       │
//!          │ consumers: { id -> pending }        │
//!          │ closed: bool                        │
//!          └──────────────────┬──────────────────┘
//!                             │
//!      ┌──────────────────────┼──────────────────────┐
//!      ▼                      ▼                      ▼
//!  [Producer]            [Consumer a]           [Consumer b]
//!  publish()             wait_for_frame()       wait_for_frame()
//! ```
//!
//! Each publish sets every pending flag and broadcasts. A consumer consumes
//! its own flag exactly once, so it never waits on a signal it already took
//! and never takes the same signal twice.

pub mod consumer;
pub mod monitor;

pub use consumer::{ConsumerEntry, ConsumerRegistry, Unregistered};
pub use monitor::{Delivery, MonitorSnapshot, SyncMonitor, WaitHandoff};
