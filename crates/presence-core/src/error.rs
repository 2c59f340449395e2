//! Unified error type for the presence engine.
//!
//! Each module keeps its own error ([`ConfigError`](crate::config::ConfigError),
//! [`RadioError`](crate::radio::RadioError)); [`PresenceError`] folds them into
//! one type for hosts, with HTTP status and machine-readable codes attached.
//!
//! Decoder failures never reach this type: a payload that does not parse
//! simply yields no identity.
//!
//! # Example
//!
//! ```rust
//! use presence_core::error::PresenceError;
//! use presence_core::radio::RadioError;
//!
//! let err = PresenceError::from(RadioError::AdapterPoweredOff);
//! assert!(err.is_radio_error());
//! assert_eq!(err.http_status_code(), 503);
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Every failure a presence host can observe.
#[derive(Debug, Error)]
pub enum PresenceError {
    // =========================================================================
    // RADIO ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded."
    )]
    AdapterNotFound,

    /// The Bluetooth adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    AdapterPoweredOff,

    /// Scanning could not be started or stopped unexpectedly.
    #[error("Bluetooth scan failed: {0}")]
    ScanFailed(String),

    /// A follow-up connection or read failed.
    #[error("Device query failed: {0}")]
    QueryFailed(String),

    // =========================================================================
    // ENGINE ERRORS
    // =========================================================================
    /// No record is tracked under the requested key.
    #[error("Device not found: '{0}'")]
    DeviceNotFound(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // I/O ERRORS
    // =========================================================================
    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result alias for presence operations.
pub type Result<T> = std::result::Result<T, PresenceError>;

impl PresenceError {
    /// Returns `true` if this error comes from the radio.
    #[inline]
    #[must_use]
    pub const fn is_radio_error(&self) -> bool {
        matches!(
            self,
            Self::AdapterNotFound
                | Self::AdapterPoweredOff
                | Self::ScanFailed(_)
                | Self::QueryFailed(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::IoError(_))
    }

    /// Returns `true` if retrying later may succeed without operator action.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ScanFailed(_) | Self::QueryFailed(_))
    }

    /// HTTP status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::ConfigNotFound(_) | Self::DeviceNotFound(_) => 404,
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,
            Self::IoError(_) => 500,
            Self::QueryFailed(_) => 502,
            Self::AdapterNotFound | Self::AdapterPoweredOff | Self::ScanFailed(_) => 503,
        }
    }

    /// Machine-readable error code.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AdapterNotFound => "BLUETOOTH_ADAPTER_NOT_FOUND",
            Self::AdapterPoweredOff => "BLUETOOTH_ADAPTER_POWERED_OFF",
            Self::ScanFailed(_) => "BLUETOOTH_SCAN_FAILED",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for PresenceError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path.into()),
            ConfigError::ReadError { path, source } => {
                Self::IoError(std::io::Error::new(source.kind(), format!("{path}: {source}")))
            }
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::radio::RadioError> for PresenceError {
    fn from(err: crate::radio::RadioError) -> Self {
        use crate::radio::RadioError;
        match err {
            RadioError::AdapterNotFound => Self::AdapterNotFound,
            RadioError::AdapterPoweredOff => Self::AdapterPoweredOff,
            RadioError::SessionInitFailed { message }
            | RadioError::DiscoveryFailed { message }
            | RadioError::Internal { message } => Self::ScanFailed(message),
            other @ (RadioError::ConnectTimeout { .. }
            | RadioError::ConnectFailed { .. }
            | RadioError::CharacteristicNotFound { .. }
            | RadioError::Disconnected) => Self::QueryFailed(other.to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
