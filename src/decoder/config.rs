//! Decoder configuration

use std::path::PathBuf;

use super::error::{DecoderError, Result};

/// Default dump file name
pub const DEFAULT_DUMP_PATH: &str = "NV12.yuv";

/// Default ring capacity
pub const DEFAULT_BUFFER_CAPACITY: usize = 8;

/// Event channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Largest accepted event channel capacity
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

/// Decoder configuration options
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Number of decoded frames kept for look-back (must be at least 1)
    pub buffer_capacity: usize,

    /// Dump every decoded frame as raw NV12
    pub diagnostics_enabled: bool,

    /// Dump file location
    pub dump_path: PathBuf,

    /// Capacity of the decoder event channel (1 to `MAX_EVENT_CAPACITY`)
    pub event_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            diagnostics_enabled: false,
            dump_path: PathBuf::from(DEFAULT_DUMP_PATH),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl DecoderConfig {
    /// Create a config with the given ring capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer_capacity: capacity,
            ..Default::default()
        }
    }

    /// Set the ring capacity
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Enable NV12 dumping to the configured path
    pub fn enable_diagnostics(mut self) -> Self {
        self.diagnostics_enabled = true;
        self
    }

    /// Set the dump file location
    pub fn dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = path.into();
        self
    }

    /// Set the event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check the config before any resource is acquired
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(DecoderError::InvalidConfig(
                "buffer_capacity must be at least 1".into(),
            ));
        }
        if !(1..=MAX_EVENT_CAPACITY).contains(&self.event_capacity) {
            return Err(DecoderError::InvalidConfig(format!(
                "event_capacity must be between 1 and {}, got {}",
                MAX_EVENT_CAPACITY, self.event_capacity
            )));
        }
        if self.diagnostics_enabled && self.dump_path.as_os_str().is_empty() {
            return Err(DecoderError::InvalidConfig(
                "dump_path is required when diagnostics are enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DecoderConfig::default();

        assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert!(!config.diagnostics_enabled);
        assert_eq!(config.dump_path, PathBuf::from("NV12.yuv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_capacity() {
        let config = DecoderConfig::with_capacity(3);

        assert_eq!(config.buffer_capacity, 3);
        assert!(!config.diagnostics_enabled);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = DecoderConfig::default().buffer_capacity(0);

        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));
    }

    #[test]
    fn test_event_capacity_bounds() {
        let config = DecoderConfig::default().event_capacity(0);
        assert_eq!(config.event_capacity, 0);
        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));

        let config = DecoderConfig::default().event_capacity(usize::MAX);
        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));

        let config = DecoderConfig::default().event_capacity(MAX_EVENT_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_dump_path_rejected() {
        let config = DecoderConfig::default().enable_diagnostics().dump_path("");

        assert!(matches!(config.validate(), Err(DecoderError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_chaining() {
        let config = DecoderConfig::default()
            .buffer_capacity(16)
            .enable_diagnostics()
            .dump_path("/tmp/frames.yuv")
            .event_capacity(32);

        assert_eq!(config.buffer_capacity, 16);
        assert!(config.diagnostics_enabled);
        assert_eq!(config.dump_path, PathBuf::from("/tmp/frames.yuv"));
        assert_eq!(config.event_capacity, 32);
        assert!(config.validate().is_ok());
    }
}
