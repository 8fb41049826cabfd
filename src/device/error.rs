//! Device Error Types
//!
//! Every failure in discovery, config loading and event reading is local to a
//! single device. Errors are logged by the dispatch loop and never abort it.

use std::path::PathBuf;
use thiserror::Error;

use super::DeviceId;

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Rule field a token was parsed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    /// Event type (`EV_KEY`, ...)
    Type,
    /// Event code (`KEY_PAGEDOWN`, ...)
    Code,
    /// Event value (`1` for press, ...)
    Value,
}

impl std::fmt::Display for RuleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleField::Type => f.write_str("type"),
            RuleField::Code => f.write_str("code"),
            RuleField::Value => f.write_str("value"),
        }
    }
}

/// Device module error types
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Config line does not have exactly four fields
    #[error("invalid config line {line}: expected 4 fields, found {found}: {text:?}")]
    FieldCount {
        /// 1-based line number
        line: usize,
        /// Number of fields found
        found: usize,
        /// Raw line text
        text: String,
    },

    /// Type, code or value token is neither a literal nor a known name
    #[error("invalid {field} on config line {line}: {token:?}")]
    InvalidToken {
        /// 1-based line number
        line: usize,
        /// Field being parsed
        field: RuleField,
        /// Offending token
        token: String,
    },

    /// No config file named after the device id
    #[error("no config for device {id} in {dir}")]
    ConfigNotFound {
        /// Device id
        id: DeviceId,
        /// Directory searched
        dir: PathBuf,
    },

    /// Config directory or file could not be read
    #[error("unable to read {path}: {source}")]
    ConfigUnreadable {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Event stream could not be opened
    #[error("error opening {path}: {source}")]
    DeviceUnopenable {
        /// Event stream path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Tracked device stopped delivering events
    #[error("lost device {id}: {reason}")]
    DeviceLost {
        /// Device id
        id: DeviceId,
        /// What the read reported
        reason: String,
    },

    /// Device registry could not be read
    #[error("error reading device registry {path}: {source}")]
    RegistryUnreadable {
        /// Registry path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad field count or unresolvable token; the device is not tracked
    ConfigMalformed,
    /// Missing config or stream that cannot be opened; the device is not tracked
    DeviceUnopenable,
    /// Short read or disconnect sentinel; the device is dropped
    DeviceLost,
    /// Registry unreadable; the scan adds nothing
    DiscoveryReadFailure,
}

impl DeviceError {
    /// Classify error for logging and recovery
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::FieldCount { .. }
            | DeviceError::InvalidToken { .. } => ErrorKind::ConfigMalformed,

            DeviceError::ConfigNotFound { .. }
            | DeviceError::ConfigUnreadable { .. }
            | DeviceError::DeviceUnopenable { .. } => ErrorKind::DeviceUnopenable,

            DeviceError::DeviceLost { .. } => ErrorKind::DeviceLost,

            DeviceError::RegistryUnreadable { .. } => ErrorKind::DiscoveryReadFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = DeviceError::FieldCount {
            line: 2,
            found: 3,
            text: "next 1 30".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ConfigMalformed);

        let err = DeviceError::ConfigNotFound {
            id: DeviceId::new("aa:bb"),
            dir: PathBuf::from("/tmp"),
        };
        assert_eq!(err.kind(), ErrorKind::DeviceUnopenable);

        let err = DeviceError::DeviceLost {
            id: DeviceId::new("aabb"),
            reason: "short read".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::DeviceLost);
    }

    #[test]
    fn test_error_display() {
        let err = DeviceError::InvalidToken {
            line: 1,
            field: RuleField::Code,
            token: "KEY_NOPE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid code on config line 1: \"KEY_NOPE\""
        );
    }
}
