//! Decode backend interfaces
//!
//! The decoder core does not decode anything itself. It drives a
//! [`DecodeBackend`] that turns compressed packets into decoded frames, and an
//! [`Accelerator`] that provides the device context the backend decodes on.
//!
//! Implementations wrap a hardware decoder (NVDEC, VA-API, VideoToolbox, ...)
//! or a software one. [`SyntheticBackend`] is a deterministic software
//! backend for tests and demos.

pub mod accelerator;
pub mod error;
pub mod synthetic;

pub use accelerator::{Accelerator, DeviceContext, DeviceKind, HostAccelerator};
pub use error::BackendError;
pub use synthetic::SyntheticBackend;

use crate::frame::{DecodedFrame, Packet, StreamParameters};

/// What the backend produced for one submitted packet
#[derive(Debug)]
pub enum SubmitOutcome {
    /// One decoded frame is ready
    Ready(DecodedFrame),
    /// The backend buffered the packet and needs more input
    NeedMoreInput,
    /// The stream is fully drained
    EndOfStream,
}

/// A video decoder the core can drive
///
/// Called from the single producer thread only.
pub trait DecodeBackend: Send + 'static {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Configure the decoder for the stream on the given device
    fn open(&mut self, params: &StreamParameters, device: &DeviceContext)
        -> Result<(), BackendError>;

    /// Feed one packet and collect at most one frame
    fn submit(&mut self, packet: Packet) -> Result<SubmitOutcome, BackendError>;

    /// Produce a host-resident NV12 copy of `frame` for diagnostics
    ///
    /// The default accepts host NV12 frames as-is and rejects everything
    /// else; backends with device output override it.
    fn transfer_to_host(&mut self, frame: &DecodedFrame) -> Result<DecodedFrame, BackendError> {
        use crate::frame::PixelFormat;

        if frame.is_device_resident() || frame.format != PixelFormat::Nv12 {
            return Err(BackendError::Transfer(format!(
                "{} cannot transfer {:?} frames",
                self.name(),
                frame.format
            )));
        }
        Ok(frame.clone())
    }

    /// Release decoder resources
    fn close(&mut self);
}

impl<B: DecodeBackend + ?Sized> DecodeBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(
        &mut self,
        params: &StreamParameters,
        device: &DeviceContext,
    ) -> Result<(), BackendError> {
        (**self).open(params, device)
    }

    fn submit(&mut self, packet: Packet) -> Result<SubmitOutcome, BackendError> {
        (**self).submit(packet)
    }

    fn transfer_to_host(&mut self, frame: &DecodedFrame) -> Result<DecodedFrame, BackendError> {
        (**self).transfer_to_host(frame)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
