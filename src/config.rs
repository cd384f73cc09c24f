//! Configuration for beetlewal
//!
//! Centralized configuration with sensible defaults.

use crate::error::{Result, WalError};

/// Configuration for a write-ahead log
#[derive(Debug, Clone)]
pub struct WalConfig {
    // -------------------------------------------------------------------------
    // Write Configuration
    // -------------------------------------------------------------------------
    /// Ceiling on a single logical record, checked before any bytes are written.
    /// `None` means unbounded.
    pub max_record_size: Option<usize>,

    /// Create missing parent directories when opening the log
    pub create_parent_dirs: bool,

    // -------------------------------------------------------------------------
    // Recovery Configuration
    // -------------------------------------------------------------------------
    /// What the reader does after reporting a fragment sequence violation
    pub malformed_policy: MalformedPolicy,
}

/// Reader behavior after a `MalformedSequence` has been reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Drop the partial record, skip to the next block boundary and keep
    /// scanning. Continuation fragments at the start of that block are
    /// skipped silently.
    #[default]
    ResyncAtNextBlock,

    /// End the pass, same as a checksum failure
    Halt,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            max_record_size: None,
            create_parent_dirs: true,
            malformed_policy: MalformedPolicy::default(),
        }
    }
}

impl WalConfig {
    /// Create a new config builder
    pub fn builder() -> WalConfigBuilder {
        WalConfigBuilder::default()
    }
}

/// Builder for WalConfig
#[derive(Default)]
pub struct WalConfigBuilder {
    config: WalConfig,
}

impl WalConfigBuilder {
    /// Set the maximum logical record size (in bytes)
    pub fn max_record_size(mut self, limit: usize) -> Self {
        self.config.max_record_size = Some(limit);
        self
    }

    /// Toggle parent directory creation on open
    pub fn create_parent_dirs(mut self, create: bool) -> Self {
        self.config.create_parent_dirs = create;
        self
    }

    /// Set the malformed-sequence policy used by readers
    pub fn malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.config.malformed_policy = policy;
        self
    }

    pub fn build(self) -> Result<WalConfig> {
        if self.config.max_record_size == Some(0) {
            return Err(WalError::Config(
                "max_record_size must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}
