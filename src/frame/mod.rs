//! Frame and packet types
//!
//! This module provides:
//! - Decoded frames and their reference-counted handles
//! - Compressed packets and stream parameters handed to the backend

pub mod handle;
pub mod packet;

pub use handle::{DecodedFrame, FrameHandle, FrameLocation, PixelFormat, Plane};
pub use packet::{CodecId, Packet, StreamParameters};
