//! Error types for the transaction log codec
//!
//! Every error in this module describes malformed or corrupted bytes, or a
//! record that could never be valid. None of them are transient: the codec
//! fails immediately and leaves truncation or recovery decisions to the
//! storage and replication layers that own checkpoints and the epoch chain.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the transaction log codec
#[derive(Debug, Error)]
pub enum Error {
    /// Version byte outside the supported set for the record kind
    #[error("Unsupported {kind} record version {version} at log position {log_position}")]
    UnsupportedVersion {
        /// Record kind name
        kind: &'static str,
        /// Version byte found
        version: u8,
        /// Log position of the record
        log_position: i64,
    },

    /// Kind byte not recognized by the active record family
    #[error("Invalid record kind {kind} at log position {log_position}")]
    InvalidRecordKind {
        /// Kind byte found
        kind: u8,
        /// Log position of the record (or -1 if not yet known)
        log_position: i64,
    },

    /// Field or offset arithmetic does not match the declared length
    #[error(
        "Malformed length at log position {log_position}: expected {expected} bytes, got {actual} ({detail})"
    )]
    MalformedLength {
        /// Log position of the record (or -1 if not yet known)
        log_position: i64,
        /// Length the record declared or required
        expected: usize,
        /// Length actually available or consumed
        actual: usize,
        /// Which field or frame failed
        detail: String,
    },

    /// Declared or computed size exceeds the configured maximum
    #[error("Record too large at log position {log_position}: {size} bytes (max: {max})")]
    RecordTooLarge {
        /// Log position of the record (or -1 if not yet known)
        log_position: i64,
        /// Declared or computed size
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// System record that cannot be read as an epoch
    #[error("Invalid epoch payload at log position {log_position}: {reason}")]
    InvalidEpochPayload {
        /// Log position of the system record
        log_position: i64,
        /// What was wrong with it
        reason: String,
    },

    /// A required identifier is the nil identifier
    #[error("Identifier {field} must not be empty")]
    IdentifierInvalid {
        /// Field name
        field: &'static str,
    },

    /// String field is not valid UTF-8
    #[error("Invalid UTF-8 in field {field} at log position {log_position}")]
    InvalidString {
        /// Field name
        field: &'static str,
        /// Log position of the record
        log_position: i64,
    },

    /// Constructor argument out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error from an output writer
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a `MalformedLength` error.
    pub fn malformed(
        log_position: i64,
        expected: usize,
        actual: usize,
        detail: impl Into<String>,
    ) -> Self {
        Error::MalformedLength {
            log_position,
            expected,
            actual,
            detail: detail.into(),
        }
    }

    /// Build an `InvalidEpochPayload` error.
    pub fn epoch_payload(log_position: i64, reason: impl Into<String>) -> Self {
        Error::InvalidEpochPayload {
            log_position,
            reason: reason.into(),
        }
    }

    /// True when the error describes bytes that cannot be trusted, as opposed
    /// to a caller passing bad arguments to a constructor.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedVersion { .. }
                | Error::InvalidRecordKind { .. }
                | Error::MalformedLength { .. }
                | Error::RecordTooLarge { .. }
                | Error::InvalidEpochPayload { .. }
                | Error::InvalidString { .. }
        )
    }

    /// Log position the error refers to, if any.
    pub fn log_position(&self) -> Option<i64> {
        match self {
            Error::UnsupportedVersion { log_position, .. }
            | Error::InvalidRecordKind { log_position, .. }
            | Error::MalformedLength { log_position, .. }
            | Error::RecordTooLarge { log_position, .. }
            | Error::InvalidEpochPayload { log_position, .. }
            | Error::InvalidString { log_position, .. } => Some(*log_position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unsupported_version() {
        let err = Error::UnsupportedVersion {
            kind: "Prepare",
            version: 7,
            log_position: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("Prepare"));
        assert!(msg.contains('7'));
        assert!(msg.contains("4096"));
    }

    #[test]
    fn test_error_display_malformed_length() {
        let err = Error::malformed(128, 90, 89, "declared length");
        let msg = err.to_string();
        assert!(msg.contains("Malformed length"));
        assert!(msg.contains("128"));
        assert!(msg.contains("expected 90"));
        assert!(msg.contains("got 89"));
        assert!(msg.contains("declared length"));
    }

    #[test]
    fn test_error_display_record_too_large() {
        let err = Error::RecordTooLarge {
            log_position: 0,
            size: 2000,
            max: 1000,
        };
        assert!(err.to_string().contains("max: 1000"));
    }

    #[test]
    fn test_error_display_identifier() {
        let err = Error::IdentifierInvalid { field: "event_id" };
        assert!(err.to_string().contains("event_id"));
    }

    #[test]
    fn test_corruption_classification() {
        assert!(Error::malformed(0, 1, 2, "x").is_corruption());
        assert!(Error::epoch_payload(0, "bad json").is_corruption());
        assert!(Error::InvalidRecordKind {
            kind: 42,
            log_position: 0
        }
        .is_corruption());
        assert!(!Error::IdentifierInvalid { field: "event_id" }.is_corruption());
        assert!(!Error::InvalidArgument("negative".to_string()).is_corruption());
    }

    #[test]
    fn test_log_position_context() {
        assert_eq!(Error::malformed(77, 1, 2, "x").log_position(), Some(77));
        assert_eq!(
            Error::InvalidArgument("x".to_string()).log_position(),
            None
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::WriteZero, "sink full");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
