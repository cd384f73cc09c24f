//! Error types for beetlewal
//!
//! Provides a unified error type for all log operations.

use thiserror::Error;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for beetlewal operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Recovery Errors
    // -------------------------------------------------------------------------
    /// A physical record failed validation (checksum, type code or length).
    #[error("Corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    /// FIRST/MIDDLE/LAST fragments arrived out of order.
    #[error("Malformed record sequence at offset {offset}: {reason}")]
    MalformedSequence { offset: u64, reason: String },

    /// The file ended in the middle of a record.
    #[error("Truncated record at offset {offset}")]
    TruncatedRecord { offset: u64 },

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    #[error("Payload of {len} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { len: usize, limit: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalError {
    /// True for damage found while scanning the log.
    ///
    /// These mark the end of the trustworthy prefix of the log; everything
    /// yielded before them is intact.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            WalError::CorruptRecord { .. }
                | WalError::MalformedSequence { .. }
                | WalError::TruncatedRecord { .. }
        )
    }

    /// File offset where the damage was detected, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            WalError::CorruptRecord { offset, .. }
            | WalError::MalformedSequence { offset, .. }
            | WalError::TruncatedRecord { offset } => Some(*offset),
            _ => None,
        }
    }
}
