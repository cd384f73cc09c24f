//! WAL Writer
//!
//! Owns the log file, its in-block write offset and the single-writer lock.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::WalConfig;
use crate::error::{Result, WalError};

use super::framer::RecordFramer;
use super::record::BLOCK_SIZE;

/// Appends logical records to the log file
///
/// ## Concurrency
/// - `write()` and `checkpoint()` hold `log` for their whole duration, so at
///   most one of them is in flight
/// - The file handle and the block offset live behind the same lock
/// - All methods take `&self`; share it behind an `Arc`
pub struct WalWriter {
    path: PathBuf,
    config: WalConfig,
    log: Mutex<RecordFramer<BufWriter<File>>>,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// The block offset is recomputed from the file length; it is never
    /// stored anywhere else. Run recovery before appending to a log that
    /// may have a damaged tail.
    pub fn open(path: &Path, config: WalConfig) -> Result<Self> {
        if config.create_parent_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        let existed = path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if !existed {
            sync_parent_dir(path)?;
        }

        let len = file.metadata()?.len();
        let framer = RecordFramer::with_len(BufWriter::with_capacity(BLOCK_SIZE, file), len);

        tracing::info!(
            path = %path.display(),
            len,
            block_offset = framer.block_offset(),
            created = !existed,
            "opened WAL"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            log: Mutex::new(framer),
        })
    }

    /// Append one logical record and fsync it
    ///
    /// Returns only after the record is durable. On error the tail of the
    /// log is unspecified and recovery must run before it is trusted again.
    pub fn write(&self, payload: &[u8]) -> Result<()> {
        if let Some(limit) = self.config.max_record_size {
            if payload.len() > limit {
                return Err(WalError::PayloadTooLarge {
                    len: payload.len(),
                    limit,
                });
            }
        }

        let mut log = self.log.lock();
        let stats = log.add_record(payload)?;

        let out = log.get_mut();
        out.flush()?;
        out.get_ref().sync_data()?;

        tracing::debug!(
            len = payload.len(),
            fragments = stats.fragments,
            padding = stats.padding,
            block_offset = log.block_offset(),
            "appended record"
        );
        Ok(())
    }

    /// Discard the whole log
    ///
    /// Only call this once the state the log protects is durable elsewhere;
    /// the ordering is the caller's responsibility.
    pub fn checkpoint(&self) -> Result<()> {
        let mut log = self.log.lock();

        let out = log.get_mut();
        out.flush()?;
        let file = out.get_ref();
        file.sync_all()?;
        let discarded = file.metadata()?.len();
        file.set_len(0)?;
        file.sync_all()?;

        log.reset();

        tracing::info!(path = %self.path.display(), discarded, "checkpointed WAL");
        Ok(())
    }

    /// Current file length in bytes
    pub fn len(&self) -> Result<u64> {
        let log = self.log.lock();
        Ok(log.get_ref().get_ref().metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write position inside the current block
    pub fn block_offset(&self) -> usize {
        self.log.lock().block_offset()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &WalConfig {
        &self.config
    }
}

impl std::fmt::Debug for WalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalWriter")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Make a freshly created file's directory entry durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
