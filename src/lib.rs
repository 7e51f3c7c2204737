//! Frame delivery for hardware-accelerated video decoding
//!
//! One producer thread feeds compressed packets to a decode backend; the
//! decoded frames land in a fixed-capacity ring. Any number of named
//! consumers pull frames at their own pace: each consumer sees every new
//! frame signal exactly once, can look back a bounded number of frames, and
//! gets an explicit `Repeat` when the requested frame does not exist.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use framering::backend::{HostAccelerator, SyntheticBackend};
//! use framering::{CodecId, Decoder, DecoderConfig, Delivery, Packet, StreamParameters};
//!
//! # fn main() -> framering::Result<()> {
//! let params = StreamParameters::new(CodecId::H264, 1920, 1080);
//! let decoder = Arc::new(Decoder::init(
//!     DecoderConfig::with_capacity(4),
//!     &params,
//!     SyntheticBackend::new(),
//!     Arc::new(HostAccelerator),
//! )?);
//!
//! let consumer = decoder.subscribe("preview")?;
//! decoder.decode(Packet::new(Bytes::from_static(&[0, 0, 0, 1, 0x65]), 0, true))?;
//!
//! if let Delivery::Frame { sequence, frame } = consumer.recv(0)? {
//!     println!("frame #{} pts={}", sequence, frame.pts);
//! }
//! decoder.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`decoder`]: the facade (`init`, `decode`, `get_frame`, `close`)
//! - [`registry`]: consumer registry and the mutex/condvar sync monitor
//! - [`buffer`]: the frame ring
//! - [`backend`]: decode backend and accelerator interfaces
//! - [`dump`]: raw NV12 diagnostic dumps
//! - [`frame`]: frame handles, packets, stream parameters
//! - [`stats`]: decoder statistics

pub mod backend;
pub mod buffer;
pub mod decoder;
pub mod dump;
pub mod frame;
pub mod registry;
pub mod stats;

pub use decoder::{
    DecodeStatus, Decoder, DecoderConfig, DecoderError, DecoderEvent, FrameConsumer, Result,
};
pub use frame::{CodecId, DecodedFrame, FrameHandle, Packet, StreamParameters};
pub use registry::Delivery;
pub use stats::DecoderStats;
