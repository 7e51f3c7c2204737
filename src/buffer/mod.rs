//! Frame buffering
//!
//! The ring keeps the last `capacity` decoded frames so consumers can ask
//! for the newest frame or look back a bounded number of frames.

pub mod ring;

pub use ring::FrameRing;
