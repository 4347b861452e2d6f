//! Codec configuration.
//!
//! Everything the codec and the in-memory log need to know about the log
//! they are reading: which record family it is written in, how large a
//! record may be, and how far back an epoch walk may go.

use crate::format::RecordFamily;
use tflog_core::{Limits, MAX_LOG_RECORD_SIZE};

/// Smallest accepted maximum record size
pub const MIN_RECORD_SIZE_LIMIT: usize = 1024;

/// Default number of epochs read by a backward walk
pub const DEFAULT_EPOCH_WALK_LIMIT: usize = 10_000;

/// Codec configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Record family of the log (default: classic).
    pub family: RecordFamily,

    /// Maximum record size in bytes, excluding framing (default: 16MB).
    pub max_record_size: usize,

    /// Maximum number of epochs a backward walk reads (default: 10,000).
    pub epoch_walk_limit: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            family: RecordFamily::Classic,
            max_record_size: MAX_LOG_RECORD_SIZE,
            epoch_walk_limit: DEFAULT_EPOCH_WALK_LIMIT,
        }
    }
}

impl CodecConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record family (builder pattern).
    pub fn with_family(mut self, family: RecordFamily) -> Self {
        self.family = family;
        self
    }

    /// Set the maximum record size (builder pattern).
    pub fn with_max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Set the epoch walk limit (builder pattern).
    pub fn with_epoch_walk_limit(mut self, limit: usize) -> Self {
        self.epoch_walk_limit = limit;
        self
    }

    /// Size limits derived from this configuration.
    pub fn limits(&self) -> Limits {
        Limits::with_max_record_size(self.max_record_size)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_record_size < MIN_RECORD_SIZE_LIMIT {
            return Err(ConfigError::RecordSizeTooSmall(self.max_record_size));
        }
        // framing stores lengths as u32, payload lengths are i32
        if self.max_record_size > i32::MAX as usize {
            return Err(ConfigError::RecordSizeTooLarge(self.max_record_size));
        }
        if self.epoch_walk_limit == 0 {
            return Err(ConfigError::EpochWalkLimitZero);
        }
        Ok(())
    }

    /// Create a configuration for testing (small records).
    pub fn for_testing() -> Self {
        CodecConfig {
            family: RecordFamily::Classic,
            max_record_size: 64 * 1024,
            epoch_walk_limit: 64,
        }
    }
}

/// Codec configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Maximum record size below the minimum.
    #[error("Maximum record size {0} is below 1KB")]
    RecordSizeTooSmall(usize),

    /// Maximum record size not representable in length fields.
    #[error("Maximum record size {0} exceeds i32::MAX")]
    RecordSizeTooLarge(usize),

    /// Epoch walks must read at least one epoch.
    #[error("Epoch walk limit must be at least 1")]
    EpochWalkLimitZero,
}

impl From<ConfigError> for tflog_core::Error {
    fn from(e: ConfigError) -> Self {
        tflog_core::Error::InvalidArgument(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CodecConfig::default();
        assert_eq!(config.family, RecordFamily::Classic);
        assert_eq!(config.max_record_size, 16 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = CodecConfig::new()
            .with_family(RecordFamily::Unified)
            .with_max_record_size(1024 * 1024)
            .with_epoch_walk_limit(5);

        assert_eq!(config.family, RecordFamily::Unified);
        assert_eq!(config.limits().max_record_size, 1024 * 1024);
        assert_eq!(config.epoch_walk_limit, 5);
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            CodecConfig::new().with_max_record_size(512).validate(),
            Err(ConfigError::RecordSizeTooSmall(512))
        );
        assert!(matches!(
            CodecConfig::new()
                .with_max_record_size(i32::MAX as usize + 1)
                .validate(),
            Err(ConfigError::RecordSizeTooLarge(_))
        ));
        assert_eq!(
            CodecConfig::new().with_epoch_walk_limit(0).validate(),
            Err(ConfigError::EpochWalkLimitZero)
        );
    }

    #[test]
    fn test_testing_config() {
        let config = CodecConfig::for_testing();
        assert!(config.validate().is_ok());
        assert!(config.max_record_size < CodecConfig::default().max_record_size);
    }
}
