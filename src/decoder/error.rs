//! Decoder error types

use crate::backend::BackendError;

/// Result type alias using [`DecoderError`]
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors surfaced by the decoder facade
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    /// Configuration was rejected before any resource was acquired
    #[error("invalid decoder config: {0}")]
    InvalidConfig(String),

    /// A startup step failed (device attach, backend open, dump sink)
    #[error("decoder init failed during {stage}: {source}")]
    BackendInit {
        stage: InitStage,
        #[source]
        source: BackendError,
    },

    /// The backend rejected a packet; buffered frames are unaffected
    #[error("decode failed: {0}")]
    Decode(#[source] BackendError),

    /// The decoder has been closed
    #[error("decoder is closed")]
    Closed,

    /// No frame arrived before the deadline
    #[error("timed out waiting for a frame")]
    Timeout,

    /// The receiver of an async wait went away before a frame arrived
    #[error("frame wait cancelled")]
    Cancelled,

    /// The consumer identity was unregistered while waiting, or never existed
    #[error("consumer not registered: {0}")]
    ConsumerUnregistered(String),

    /// The blocking wait behind an async receive panicked
    #[error("consumer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Init step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    /// Attaching the accelerator device context
    Device,
    /// Opening the backend with the stream parameters
    Backend,
    /// Opening the diagnostic dump sink
    DumpSink,
}

impl std::fmt::Display for InitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitStage::Device => write!(f, "device attach"),
            InitStage::Backend => write!(f, "backend open"),
            InitStage::DumpSink => write!(f, "dump sink open"),
        }
    }
}

impl DecoderError {
    pub(crate) fn init(stage: InitStage, source: BackendError) -> Self {
        DecoderError::BackendInit { stage, source }
    }

    /// Check if the error means the decoder can no longer be used
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DecoderError::Closed | DecoderError::BackendInit { .. } | DecoderError::InvalidConfig(_)
        )
    }
}
