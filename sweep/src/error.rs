/*!
Common error types for the sweep library.

Only acquisition can fail. The geometric analyzers resolve every edge case to
a defined sentinel instead of returning an error.
*/

use std::time::Duration;
use thiserror::Error;

/// Common result type used throughout the sweep library
pub type Result<T> = std::result::Result<T, SweepError>;

/// Top-level error type for all sweep operations
#[derive(Error, Debug)]
pub enum SweepError {
    /// No packet boundary could be found
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// A framed block could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// I/O errors (snapshot files, transport)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Invalid snapshot line or file name
    #[error("Invalid snapshot format: {0}")]
    InvalidSnapshot(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SweepError {
    /// Create a new invalid snapshot error
    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the failure only cost one slice and acquisition can carry on
    pub fn is_slice_local(&self) -> bool {
        matches!(
            self,
            Self::Decode(_)
                | Self::Sync(SyncError::Timeout { .. })
                | Self::Sync(SyncError::ScanLimit { .. })
                | Self::Sync(SyncError::Missed { .. })
        )
    }
}

/// Failures while scanning the byte stream for a packet header
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no header for slice {slice} within {waited:?}")]
    Timeout { slice: u8, waited: Duration },

    #[error("no header for slice {slice} in {scanned} bytes")]
    ScanLimit { slice: u8, scanned: usize },

    /// Another slice's header arrived first
    #[error("slice {slice} lost, found header of slice {found}")]
    Missed { slice: u8, found: u8 },

    #[error("byte source closed while looking for slice {slice}")]
    EndOfStream { slice: u8 },

    #[error("transport failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while turning a framed block into a packet
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("bad marker byte: {0:#04x}")]
    BadMarker(u8),

    #[error("index byte {0:#04x} outside slice range")]
    BadIndex(u8),
}
