//! Backend error types

/// Error reported by a decode backend or accelerator
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No usable device, or the device context could not be attached
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The codec or stream configuration is not supported
    #[error("unsupported stream: {0}")]
    Unsupported(String),

    /// The bitstream could not be decoded
    #[error("corrupt bitstream at pts {pts}: {reason}")]
    Corrupt { pts: i64, reason: String },

    /// Copying a frame out of device memory failed
    #[error("host transfer failed: {0}")]
    Transfer(String),

    /// The backend was used after close or before open
    #[error("backend not open")]
    NotOpen,

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Create a corrupt bitstream error
    pub fn corrupt(pts: i64, reason: impl Into<String>) -> Self {
        BackendError::Corrupt {
            pts,
            reason: reason.into(),
        }
    }
}
