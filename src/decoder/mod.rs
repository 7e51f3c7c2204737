//! Decoder facade
//!
//! `Decoder` is the only type most callers need: `init` it with a backend
//! and an accelerator, call `decode` from one producer thread, and read
//! frames with `get_frame` (or a `FrameConsumer`) from any number of
//! consumer threads.
//!
//! ```text
//!   packets ──► Decoder::decode ──► backend.submit ──► SyncMonitor::publish
//!                                                          │ notify_all
//!                ┌─────────────────────┬───────────────────┤
//!                ▼                     ▼                   ▼
//!         get_frame(0, "a")    get_frame(-2, "b")   FrameConsumer::recv_async
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod facade;

pub use config::DecoderConfig;
pub use consumer::FrameConsumer;
pub use error::{DecoderError, InitStage, Result};
pub use event::DecoderEvent;
pub use facade::{DecodeStatus, Decoder};
