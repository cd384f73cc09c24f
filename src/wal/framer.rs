//! Record Framer
//!
//! Splits logical records into block-aligned physical records.

use std::io::{self, Write};

use super::record::{RecordHeader, RecordType, BLOCK_SIZE, HEADER_SIZE};

const ZEROS: [u8; HEADER_SIZE] = [0u8; HEADER_SIZE];

/// What one `add_record` call put on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Physical records emitted
    pub fragments: usize,
    /// Zero bytes written to close out blocks
    pub padding: usize,
    /// Total bytes written (headers + payload + padding)
    pub bytes_written: usize,
}

/// Frames logical records onto a byte sink
///
/// `block_offset` is the write position inside the current block and is
/// always `< BLOCK_SIZE` between calls.
pub struct RecordFramer<W: Write> {
    dest: W,
    block_offset: usize,
}

impl<W: Write> RecordFramer<W> {
    /// Frame onto an empty sink
    pub fn new(dest: W) -> Self {
        Self::with_len(dest, 0)
    }

    /// Frame onto a sink that already holds `existing_len` bytes
    pub fn with_len(dest: W, existing_len: u64) -> Self {
        Self {
            dest,
            block_offset: (existing_len % BLOCK_SIZE as u64) as usize,
        }
    }

    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    /// Reset after the sink has been emptied externally
    pub fn reset(&mut self) {
        self.block_offset = 0;
    }

    pub fn get_ref(&self) -> &W {
        &self.dest
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.dest
    }

    pub fn into_inner(self) -> W {
        self.dest
    }

    /// Append one logical record
    ///
    /// An empty record still produces a single zero-length FULL record.
    pub fn add_record(&mut self, mut data: &[u8]) -> io::Result<FrameStats> {
        let mut stats = FrameStats::default();
        let mut is_first = true;

        loop {
            let space = BLOCK_SIZE - self.block_offset;
            if space <= HEADER_SIZE {
                // Not enough room for a header plus payload: close the block
                self.dest.write_all(&ZEROS[..space])?;
                tracing::trace!(padding = space, "closed block with padding");
                stats.padding += space;
                stats.bytes_written += space;
                self.block_offset = 0;
            }

            let avail = BLOCK_SIZE - HEADER_SIZE - self.block_offset;
            let take = data.len().min(avail);
            let is_last = take == data.len();
            let record_type = RecordType::for_fragment(is_first, is_last);

            self.emit_physical_record(record_type, &data[..take])?;
            stats.fragments += 1;
            stats.bytes_written += HEADER_SIZE + take;

            data = &data[take..];
            is_first = false;
            if data.is_empty() {
                break;
            }
        }

        Ok(stats)
    }

    fn emit_physical_record(&mut self, record_type: RecordType, payload: &[u8]) -> io::Result<()> {
        let header = RecordHeader::for_payload(record_type, payload);
        self.dest.write_all(&header.encode())?;
        self.dest.write_all(payload)?;

        self.block_offset += HEADER_SIZE + payload.len();
        if self.block_offset == BLOCK_SIZE {
            self.block_offset = 0;
        }
        Ok(())
    }
}
