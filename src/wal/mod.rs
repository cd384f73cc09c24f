//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only, block-framed logging.
//!
//! ## Responsibilities
//! - Frame opaque payloads into checksummed physical records
//! - Keep every physical record inside one 32 KiB block
//! - fsync each logical record before acknowledging it
//! - Replay logical records in order and stop at the first damage
//! - Discard the whole log on checkpoint
//!
//! ## File Format
//! ```text
//! ┌──────────────────────── Block (32768 bytes) ────────────────────────┐
//! │ Record │ Record │ ...                              │ Padding (≤ 7) │
//! └─────────────────────────────────────────────────────────────────────┘
//!
//! Record
//! ┌──────────┬─────────┬──────────┬────────────────────┐
//! │ CRC (4)  │ Len (2) │ Type (1) │ Payload (Len)      │
//! └──────────┴─────────┴──────────┴────────────────────┘
//! ```
//!
//! All integers are little-endian. The CRC is CRC-32 (IEEE) over the type
//! byte followed by the payload. Type is FULL=1, FIRST=2, MIDDLE=3, LAST=4;
//! a logical record is one FULL record, or FIRST, zero or more MIDDLE, and
//! LAST. There is no file header or footer.

mod framer;
mod reader;
mod record;
mod recovery;
mod writer;

pub use framer::{FrameStats, RecordFramer};
pub use reader::{WalIterator, WalReader};
pub use record::{compute_checksum, RecordHeader, RecordType, BLOCK_SIZE, HEADER_SIZE, MAX_FRAGMENT_SIZE};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
