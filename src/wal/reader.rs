//! WAL Reader
//!
//! Scans the log block by block, validates each physical record and
//! reassembles fragmented logical records.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::config::{MalformedPolicy, WalConfig};
use crate::error::{Result, WalError};

use super::record::{RecordHeader, RecordType, BLOCK_SIZE, HEADER_SIZE};

/// Reads logical records from a WAL file
///
/// Meant for startup replay; reading while a `WalWriter` appends to the
/// same file is not supported.
pub struct WalReader {
    path: PathBuf,
    file: File,
    policy: MalformedPolicy,
}

impl WalReader {
    /// Open a WAL file for reading with the default malformed-sequence policy
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            policy: MalformedPolicy::default(),
        })
    }

    /// Open a WAL file for reading, taking the policy from `config`
    pub fn open_with_config(path: &Path, config: &WalConfig) -> Result<Self> {
        Ok(Self::open(path)?.with_policy(config.malformed_policy))
    }

    /// Choose what happens after a fragment sequence violation
    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Start a recovery pass from the beginning of the file
    ///
    /// Every call rewinds, so a log can be scanned more than once.
    pub fn iter(&mut self) -> Result<WalIterator<&mut File>> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(WalIterator::new(&mut self.file, self.policy))
    }

    /// Read every logical record, failing on the first damaged one
    pub fn read_all(&mut self) -> Result<Vec<Vec<u8>>> {
        self.iter()?.collect()
    }
}

impl std::fmt::Debug for WalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalReader")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// One validated physical record inside the current block buffer
struct Fragment {
    record_type: RecordType,
    offset: u64,
    start: usize,
    end: usize,
}

/// Logical record being reassembled from FIRST/MIDDLE/LAST fragments
struct Assembly {
    buf: Vec<u8>,
    offset: u64,
}

/// Lazy iterator over the logical records of one recovery pass
///
/// Yields `Ok(record)` in file order. Damage is yielded as a single `Err`
/// (`CorruptRecord`, `TruncatedRecord`, or `MalformedSequence`) after which
/// the pass ends; only a `MalformedSequence` under
/// [`MalformedPolicy::ResyncAtNextBlock`] lets the pass continue.
///
/// End of file between records ends the pass cleanly, with one exception:
/// a partial header (fewer than `HEADER_SIZE` bytes left before EOF while
/// the block still has room) is reported as `TruncatedRecord`. The writer
/// never leaves such a tail; it is a torn write that `WalRecovery::repair`
/// removes.
pub struct WalIterator<R: Read> {
    src: R,
    policy: MalformedPolicy,

    block: Vec<u8>,
    block_len: usize,
    block_start: u64,
    pos: usize,
    loaded: bool,
    needs_block: bool,

    assembling: Option<Assembly>,
    resyncing: bool,
    valid_len: u64,
    malformed_count: u64,
    done: bool,
}

impl<R: Read> WalIterator<R> {
    /// Scan `src` from its current position, which must be a block boundary
    pub fn new(src: R, policy: MalformedPolicy) -> Self {
        Self {
            src,
            policy,
            block: vec![0u8; BLOCK_SIZE],
            block_len: 0,
            block_start: 0,
            pos: 0,
            loaded: false,
            needs_block: true,
            assembling: None,
            resyncing: false,
            valid_len: 0,
            malformed_count: 0,
            done: false,
        }
    }

    /// Byte offset of the scan cursor
    pub fn cursor(&self) -> u64 {
        self.block_start + self.pos as u64
    }

    /// End offset of the last logical record yielded
    ///
    /// Everything before this offset is intact; the file can be truncated
    /// here to discard a damaged tail.
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// Sequence violations reported so far
    pub fn malformed_count(&self) -> u64 {
        self.malformed_count
    }

    /// True once the pass has ended, cleanly or not
    pub fn is_finished(&self) -> bool {
        self.done
    }

    fn load_block(&mut self) -> io::Result<bool> {
        if self.loaded {
            self.block_start += BLOCK_SIZE as u64;
        }
        self.loaded = true;
        self.needs_block = false;
        self.pos = 0;
        self.block_len = read_block(&mut self.src, &mut self.block)?;
        Ok(self.block_len > 0)
    }

    /// Move to the next block boundary; returns false at end of file
    fn skip_block_tail(&mut self) -> bool {
        if self.block_len < BLOCK_SIZE {
            self.pos = self.block_len;
            false
        } else {
            self.needs_block = true;
            true
        }
    }

    /// Next validated physical record, or `None` at a clean end of file
    fn next_fragment(&mut self) -> Result<Option<Fragment>> {
        loop {
            if self.needs_block && !self.load_block()? {
                return Ok(None);
            }

            let offset = self.cursor();
            let in_block = BLOCK_SIZE - self.pos;
            let available = self.block_len - self.pos;

            // Drained buffer, or a trailer too small to hold a header
            if available == 0 || in_block < HEADER_SIZE {
                if !self.skip_block_tail() {
                    return Ok(None);
                }
                continue;
            }

            if available < HEADER_SIZE {
                return Err(WalError::TruncatedRecord { offset });
            }

            let mut raw = [0u8; HEADER_SIZE];
            raw.copy_from_slice(&self.block[self.pos..self.pos + HEADER_SIZE]);
            let header = RecordHeader::decode(&raw);

            if header.is_padding() {
                tracing::trace!(offset, "skipping zeroed block tail");
                if !self.skip_block_tail() {
                    return Ok(None);
                }
                continue;
            }

            let len = header.length as usize;
            if HEADER_SIZE + len > in_block {
                return Err(WalError::CorruptRecord {
                    offset,
                    reason: format!("record length {} crosses block boundary", len),
                });
            }
            if HEADER_SIZE + len > available {
                return Err(WalError::TruncatedRecord { offset });
            }

            let start = self.pos + HEADER_SIZE;
            let end = start + len;
            if !header.matches(&self.block[start..end]) {
                return Err(WalError::CorruptRecord {
                    offset,
                    reason: "checksum mismatch".to_string(),
                });
            }

            let record_type = RecordType::try_from(header.record_type).map_err(|code| {
                WalError::CorruptRecord {
                    offset,
                    reason: format!("unknown record type {}", code),
                }
            })?;

            self.pos = end;
            return Ok(Some(Fragment {
                record_type,
                offset,
                start,
                end,
            }));
        }
    }

    fn malformed(&mut self, offset: u64, reason: String) -> WalError {
        self.assembling = None;
        self.malformed_count += 1;

        match self.policy {
            MalformedPolicy::Halt => self.done = true,
            MalformedPolicy::ResyncAtNextBlock => {
                self.skip_block_tail();
                self.resyncing = true;
            }
        }

        tracing::warn!(offset, %reason, policy = ?self.policy, "malformed record sequence");
        WalError::MalformedSequence { offset, reason }
    }

    fn finish(&mut self, err: WalError) -> WalError {
        self.done = true;
        self.assembling = None;
        if err.is_corruption() {
            tracing::warn!(error = %err, valid_len = self.valid_len, "recovery stopped at damaged record");
        }
        err
    }
}

impl<R: Read> Iterator for WalIterator<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let frag = match self.next_fragment() {
                Ok(Some(frag)) => frag,
                Ok(None) => {
                    self.done = true;
                    // End of file with a record still open is a torn write
                    return self
                        .assembling
                        .take()
                        .map(|partial| Err(self.finish(WalError::TruncatedRecord { offset: partial.offset })));
                }
                // A torn fragment belongs to the record that is still open
                Err(WalError::TruncatedRecord { offset }) => {
                    let offset = self.assembling.as_ref().map_or(offset, |partial| partial.offset);
                    return Some(Err(self.finish(WalError::TruncatedRecord { offset })));
                }
                Err(e) => return Some(Err(self.finish(e))),
            };

            if self.resyncing {
                // Tail of the record abandoned in the previous block
                if matches!(frag.record_type, RecordType::Middle | RecordType::Last) {
                    continue;
                }
                self.resyncing = false;
            }

            let payload = &self.block[frag.start..frag.end];
            match (frag.record_type, self.assembling.as_mut()) {
                (RecordType::Full, None) => {
                    let record = payload.to_vec();
                    self.valid_len = self.block_start + self.pos as u64;
                    return Some(Ok(record));
                }
                (RecordType::First, None) => {
                    self.assembling = Some(Assembly {
                        buf: payload.to_vec(),
                        offset: frag.offset,
                    });
                }
                (RecordType::Middle, Some(partial)) => {
                    partial.buf.extend_from_slice(payload);
                }
                (RecordType::Last, Some(partial)) => {
                    partial.buf.extend_from_slice(payload);
                    let record = std::mem::take(&mut partial.buf);
                    self.assembling = None;
                    self.valid_len = self.block_start + self.pos as u64;
                    return Some(Ok(record));
                }
                (kind @ (RecordType::Middle | RecordType::Last), None) => {
                    let reason = format!("{:?} fragment without a preceding First", kind);
                    return Some(Err(self.malformed(frag.offset, reason)));
                }
                (kind @ (RecordType::First | RecordType::Full), Some(partial)) => {
                    let reason = format!(
                        "{:?} fragment while record at offset {} is unfinished",
                        kind, partial.offset
                    );
                    return Some(Err(self.malformed(frag.offset, reason)));
                }
            }
        }
    }
}

/// Fill `buf` from `src`, stopping early only at end of input
fn read_block<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
