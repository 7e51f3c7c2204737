//! Decoded frame and its reference-counted handle
//!
//! A `DecodedFrame` is what the decode backend hands back for one access unit.
//! The core never looks at pixel content except when dumping diagnostics, so
//! the planes are plain `Bytes` and the residency is only a tag.
//!
//! `FrameHandle` wraps the frame in an `Arc`. Every ring slot owns exactly one
//! handle; consumers receive their own reference through [`FrameHandle::acquire_ref`],
//! so the slot may be overwritten while a consumer still holds an older frame.

use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;

/// Pixel layout of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Semi-planar 4:2:0: Y plane followed by interleaved UV plane
    Nv12,
    /// Opaque accelerator surface; content must be transferred to host first
    DeviceSurface,
}

/// Where the frame memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLocation {
    /// System memory, planes are directly readable
    Host,
    /// Accelerator memory on the given device ordinal
    Device(u32),
}

/// One image plane
#[derive(Debug, Clone)]
pub struct Plane {
    /// Plane bytes (reference counted, never copied on clone)
    pub data: Bytes,
    /// Bytes per row including padding
    pub stride: usize,
}

impl Plane {
    /// Create a plane
    pub fn new(data: Bytes, stride: usize) -> Self {
        Self { data, stride }
    }

    /// Get a row of `width` bytes, or `None` if the plane is too short
    pub fn row(&self, index: usize, width: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.stride)?;
        let end = start.checked_add(width)?;
        self.data.get(start..end)
    }
}

/// A frame produced by the decode backend
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Visible width in pixels
    pub width: u32,
    /// Visible height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: PixelFormat,
    /// Memory residency
    pub location: FrameLocation,
    /// Presentation timestamp (stream time base)
    pub pts: i64,
    /// Image planes; empty for device surfaces
    pub planes: Vec<Plane>,
}

impl DecodedFrame {
    /// Create a host-resident NV12 frame from its luma and chroma planes
    pub fn nv12(width: u32, height: u32, pts: i64, luma: Plane, chroma: Plane) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Nv12,
            location: FrameLocation::Host,
            pts,
            planes: vec![luma, chroma],
        }
    }

    /// Create an opaque device-resident frame
    pub fn device(width: u32, height: u32, pts: i64, ordinal: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::DeviceSurface,
            location: FrameLocation::Device(ordinal),
            pts,
            planes: Vec::new(),
        }
    }

    /// Check if the frame lives in accelerator memory
    pub fn is_device_resident(&self) -> bool {
        matches!(self.location, FrameLocation::Device(_))
    }

    /// Total size of all planes in bytes
    pub fn size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }
}

/// Shared handle to a decoded frame
///
/// Cloning is an explicit reference acquisition; dropping releases it.
#[derive(Debug)]
pub struct FrameHandle(Arc<DecodedFrame>);

impl FrameHandle {
    /// Wrap a freshly decoded frame, taking the first reference
    pub fn new(frame: DecodedFrame) -> Self {
        Self(Arc::new(frame))
    }

    /// Take a new reference to the same frame
    pub fn acquire_ref(&self) -> Self {
        Self(Arc::clone(&self.0))
    }

    /// Give up this reference
    pub fn release(self) {
        drop(self);
    }

    /// Number of live references, including this one
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Check if both handles point at the same frame
    pub fn same_frame(&self, other: &FrameHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Clone for FrameHandle {
    fn clone(&self) -> Self {
        self.acquire_ref()
    }
}

impl Deref for FrameHandle {
    type Target = DecodedFrame;

    fn deref(&self) -> &DecodedFrame {
        &self.0
    }
}
