//! Accelerator device contexts

use super::error::BackendError;

/// Kind of device a context refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// NVIDIA CUDA
    Cuda,
    /// VA-API (Linux)
    Vaapi,
    /// VideoToolbox (macOS)
    VideoToolbox,
    /// No device, frames stay in system memory
    Host,
}

/// Attached device context handed to the backend
///
/// Opaque to the core; it is only passed to the backend and handed back to
/// the accelerator on teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContext {
    /// Device kind
    pub kind: DeviceKind,
    /// Device ordinal
    pub ordinal: u32,
}

impl DeviceContext {
    /// Create a context for a device
    pub fn new(kind: DeviceKind, ordinal: u32) -> Self {
        Self { kind, ordinal }
    }

    /// Context for system-memory decoding
    pub fn host() -> Self {
        Self::new(DeviceKind::Host, 0)
    }

    /// Check if frames decoded on this context live in device memory
    pub fn is_hardware(&self) -> bool {
        self.kind != DeviceKind::Host
    }
}

/// Source of device contexts
pub trait Accelerator: Send + Sync {
    /// Attach to the current device context
    fn attach(&self) -> Result<DeviceContext, BackendError>;

    /// Release a context obtained from `attach`
    fn detach(&self, context: DeviceContext);
}

/// Accelerator for software decoding
#[derive(Debug, Clone, Copy, Default)]
pub struct HostAccelerator;

impl Accelerator for HostAccelerator {
    fn attach(&self) -> Result<DeviceContext, BackendError> {
        Ok(DeviceContext::host())
    }

    fn detach(&self, _context: DeviceContext) {}
}
