//! # beetlewal
//!
//! The durability layer of an embedded table store:
//! - Block-framed write-ahead log with CRC-32 checked records
//! - Arbitrary-length opaque payloads, fragmented across 32 KiB blocks
//! - Crash recovery that keeps every record before the first damage
//! - Single-writer lock owned by the log itself
//! - Whole-file checkpoint once the caller's state is durable
//!
//! ## Architecture Overview
//!
//! ```text
//!        Statement executor                 Storage engine startup
//!               │                                     │
//!        write(payload)                         WalReader::open
//!               │                                     │
//! ┌─────────────▼─────────────┐         ┌─────────────▼─────────────┐
//! │         WalWriter         │         │        WalIterator        │
//! │  (Mutex: file + offset)   │         │  (reassembly, checksums)  │
//! └─────────────┬─────────────┘         └─────────────▲─────────────┘
//!               │                                     │
//! ┌─────────────▼─────────────┐                       │
//! │       RecordFramer        │                       │
//! │ (FULL/FIRST/MIDDLE/LAST)  │                       │
//! └─────────────┬─────────────┘                       │
//!               │            ┌───────────┐            │
//!               └───────────►│  wal.log  │────────────┘
//!                            └───────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use beetlewal::{WalConfig, WalReader, WalWriter};
//!
//! # fn main() -> beetlewal::Result<()> {
//! let path = Path::new("data/wal.log");
//! let wal = WalWriter::open(path, WalConfig::default())?;
//! wal.write(b"INSERT 1")?;
//!
//! // At restart
//! for record in WalReader::open(path)?.iter()? {
//!     let payload = record?;
//!     // replay payload into the storage engine
//! #   let _ = payload;
//! }
//!
//! // Once the engine's own state is durable
//! wal.checkpoint()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, WalError};
pub use config::{MalformedPolicy, WalConfig};
pub use wal::{RecoveryResult, WalIterator, WalReader, WalRecovery, WalWriter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of beetlewal
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
