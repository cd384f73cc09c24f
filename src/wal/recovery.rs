//! WAL Recovery
//!
//! Startup-time replay: drains one recovery pass and summarizes what was
//! found, optionally cutting a damaged tail off the file.

use std::fs::OpenOptions;
use std::path::Path;

use crate::config::{MalformedPolicy, WalConfig};
use crate::error::{Result, WalError};

use super::WalReader;

/// Handles WAL recovery after crash
#[derive(Debug, Clone, Copy, Default)]
pub struct WalRecovery {
    policy: MalformedPolicy,
}

/// Result of a recovery operation
#[derive(Debug)]
pub struct RecoveryResult {
    /// Number of logical records successfully recovered
    pub records_recovered: u64,

    /// Total payload bytes across recovered records
    pub bytes_recovered: u64,

    /// Sequence violations skipped by resynchronization
    pub malformed_skipped: u64,

    /// End offset of the last intact logical record
    pub valid_len: u64,

    /// File length when the pass started
    pub file_len: u64,

    /// Damage that ended the pass, if any
    pub corruption: Option<WalError>,

    /// Whether the file was cut back to `valid_len`
    pub was_truncated: bool,
}

impl RecoveryResult {
    /// No damage of any kind was seen
    pub fn is_clean(&self) -> bool {
        self.corruption.is_none() && self.malformed_skipped == 0
    }

    /// Bytes after `valid_len` that cannot be trusted
    pub fn has_damaged_tail(&self) -> bool {
        self.valid_len < self.file_len
    }
}

impl WalRecovery {
    pub fn new(policy: MalformedPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &WalConfig) -> Self {
        Self::new(config.malformed_policy)
    }

    /// Recover logical records from a WAL file
    ///
    /// Damage is part of the result, not an error: every record before the
    /// damaged one is returned. Only I/O failures come back as `Err`.
    pub fn recover(&self, path: &Path) -> Result<(Vec<Vec<u8>>, RecoveryResult)> {
        let mut records = Vec::new();
        let result = self.scan(path, |record| records.push(record))?;
        Ok((records, result))
    }

    /// Verify integrity of a WAL file without modifying it or keeping payloads
    pub fn verify(&self, path: &Path) -> Result<RecoveryResult> {
        self.scan(path, |_| {})
    }

    /// Recover, then truncate the file to the end of the last intact record
    ///
    /// Appends made after a repair are not stranded behind a damaged tail.
    pub fn repair(&self, path: &Path) -> Result<(Vec<Vec<u8>>, RecoveryResult)> {
        let (records, mut result) = self.recover(path)?;

        if result.has_damaged_tail() {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;
            result.was_truncated = true;

            tracing::warn!(
                path = %path.display(),
                from = result.file_len,
                to = result.valid_len,
                "truncated damaged WAL tail"
            );
        }

        Ok((records, result))
    }

    fn scan<F>(&self, path: &Path, mut sink: F) -> Result<RecoveryResult>
    where
        F: FnMut(Vec<u8>),
    {
        let mut reader = WalReader::open(path)?.with_policy(self.policy);
        let file_len = reader.len()?;

        let mut records_recovered = 0u64;
        let mut bytes_recovered = 0u64;
        let mut corruption = None;

        let mut iter = reader.iter()?;
        while let Some(item) = iter.next() {
            match item {
                Ok(record) => {
                    records_recovered += 1;
                    bytes_recovered += record.len() as u64;
                    sink(record);
                }
                // Resynchronized; the pass goes on
                Err(e) if e.is_corruption() && !iter.is_finished() => {}
                Err(e) if e.is_corruption() => corruption = Some(e),
                Err(e) => return Err(e),
            }
        }

        let result = RecoveryResult {
            records_recovered,
            bytes_recovered,
            malformed_skipped: if self.policy == MalformedPolicy::Halt {
                0
            } else {
                iter.malformed_count()
            },
            valid_len: iter.valid_len(),
            file_len,
            corruption,
            was_truncated: false,
        };

        tracing::info!(
            path = %path.display(),
            records = result.records_recovered,
            bytes = result.bytes_recovered,
            valid_len = result.valid_len,
            file_len = result.file_len,
            clean = result.is_clean(),
            "WAL recovery pass complete"
        );

        Ok(result)
    }
}
