//! Diagnostic frame dumping
//!
//! When diagnostics are enabled, every decoded frame is copied to host memory
//! and appended to a raw NV12 file that can be inspected with any YUV viewer:
//!
//! ```text
//! ffplay -f rawvideo -pixel_format nv12 -video_size WxH NV12.yuv
//! ```
//!
//! Dump failures never affect decoding; the decoder reports them and moves on.

pub mod nv12;

pub use nv12::{write_nv12, Nv12FileSink};

use crate::backend::BackendError;
use crate::frame::DecodedFrame;

/// Error raised while dumping a frame
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticError {
    /// The backend could not produce a host copy
    #[error("host transfer failed: {0}")]
    Transfer(#[from] BackendError),

    /// The frame layout cannot be dumped
    #[error("unsupported frame layout: {0}")]
    Layout(String),

    /// Writing to the sink failed
    #[error("dump write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only destination for dumped frames
pub trait DiagnosticSink: Send {
    /// Append one host-resident NV12 frame
    fn write_frame(&mut self, frame: &DecodedFrame) -> Result<(), DiagnosticError>;

    /// Flush and close the sink
    fn close(&mut self) -> Result<(), DiagnosticError>;
}
