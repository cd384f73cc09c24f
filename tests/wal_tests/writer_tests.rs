//! Tests for WAL Writer
//!
//! These tests verify:
//! - Creating and reopening a log
//! - Block offset tracking across writes and reopen
//! - Physical framing on disk (padding, fragmentation)
//! - Payload size limits
//! - Checkpoint
//! - Serialized concurrent writers

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use beetlewal::wal::{RecordHeader, BLOCK_SIZE, HEADER_SIZE, MAX_FRAGMENT_SIZE};
use beetlewal::{WalConfig, WalError, WalReader, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

/// (type, len, offset) of every physical record in a raw log
fn physical_records(buf: &[u8]) -> Vec<(u8, usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + HEADER_SIZE <= buf.len() {
        let room = BLOCK_SIZE - i % BLOCK_SIZE;
        if room < HEADER_SIZE {
            i += room;
            continue;
        }
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&buf[i..i + HEADER_SIZE]);
        let header = RecordHeader::decode(&raw);
        if header.is_padding() {
            i += room;
            continue;
        }
        out.push((header.record_type, header.length as usize, i));
        i += HEADER_SIZE + header.length as usize;
    }
    out
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_file() {
    let (_temp, wal_path) = setup_temp_wal();
    assert!(!wal_path.exists());

    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();

    assert!(wal_path.exists());
    assert_eq!(writer.len().unwrap(), 0);
    assert!(writer.is_empty().unwrap());
    assert_eq!(writer.block_offset(), 0);
    assert_eq!(writer.path(), wal_path.as_path());
}

#[test]
fn test_open_creates_parent_dirs() {
    let temp = TempDir::new().unwrap();
    let wal_path = temp.path().join("nested").join("dir").join("wal.log");

    WalWriter::open(&wal_path, WalConfig::default()).unwrap();
    assert!(wal_path.exists());
}

#[test]
fn test_open_without_parent_dirs_fails() {
    let temp = TempDir::new().unwrap();
    let wal_path = temp.path().join("missing").join("wal.log");
    let config = WalConfig::builder().create_parent_dirs(false).build().unwrap();

    let err = WalWriter::open(&wal_path, config).unwrap_err();
    assert!(matches!(err, WalError::Io(_)));
}

#[test]
fn test_reopen_recomputes_block_offset() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();
        writer.write(&vec![b'a'; 100]).unwrap();
        writer.write(&vec![b'b'; BLOCK_SIZE]).unwrap();
    }

    let len = fs::metadata(&wal_path).unwrap().len();
    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();
    assert_eq!(writer.len().unwrap(), len);
    assert_eq!(writer.block_offset() as u64, len % BLOCK_SIZE as u64);

    // Appending after reopen keeps the log readable
    writer.write(b"after reopen").unwrap();
    drop(writer);

    let records = WalReader::open(&wal_path).unwrap().read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2], b"after reopen");
}

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_write_small_record_layout() {
    let (_temp, wal_path) = setup_temp_wal();
    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();

    writer.write(b"hello").unwrap();

    let raw = fs::read(&wal_path).unwrap();
    assert_eq!(raw.len(), HEADER_SIZE + 5);
    assert_eq!(&raw[4..6], &5u16.to_le_bytes());
    assert_eq!(raw[6], 1);
    assert_eq!(&raw[HEADER_SIZE..], b"hello");
    assert_eq!(writer.block_offset(), HEADER_SIZE + 5);
}

#[test]
fn test_empty_payload_writes_one_full_record() {
    let (_temp, wal_path) = setup_temp_wal();
    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();

    writer.write(b"").unwrap();

    let raw = fs::read(&wal_path).unwrap();
    assert_eq!(raw.len(), HEADER_SIZE);
    assert_eq!(physical_records(&raw), vec![(1, 0, 0)]);
}

#[test]
fn test_padding_completes_block() {
    for leftover in 1..=HEADER_SIZE {
        let (_temp, wal_path) = setup_temp_wal();
        let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();

        writer.write(&vec![b'x'; BLOCK_SIZE - HEADER_SIZE - leftover]).unwrap();
        assert_eq!(writer.block_offset(), BLOCK_SIZE - leftover);

        writer.write(b"next").unwrap();

        let raw = fs::read(&wal_path).unwrap();
        assert_eq!(raw.len(), BLOCK_SIZE + HEADER_SIZE + 4);
        assert!(raw[BLOCK_SIZE - leftover..BLOCK_SIZE].iter().all(|&b| b == 0));

        let recs = physical_records(&raw);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1], (1, 4, BLOCK_SIZE));
    }
}

#[test]
fn test_multi_block_fragmentation() {
    let (_temp, wal_path) = setup_temp_wal();
    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();

    let payload = vec![b'm'; BLOCK_SIZE * 3 + 100];
    writer.write(&payload).unwrap();

    let recs = physical_records(&fs::read(&wal_path).unwrap());
    let types: Vec<u8> = recs.iter().map(|r| r.0).collect();

    assert_eq!(types[0], 2);
    assert_eq!(*types.last().unwrap(), 4);
    assert!(types.len() >= 3);
    assert!(types[1..types.len() - 1].iter().all(|&t| t == 3));
    assert_eq!(types.iter().filter(|&&t| t == 2).count(), 1);
    assert_eq!(types.iter().filter(|&&t| t == 4).count(), 1);
    assert_eq!(recs.iter().map(|r| r.1).sum::<usize>(), payload.len());

    for (_, len, offset) in &recs {
        assert!(*len <= MAX_FRAGMENT_SIZE);
        assert_eq!(offset / BLOCK_SIZE, (offset + HEADER_SIZE + len - 1) / BLOCK_SIZE);
    }
}

#[test]
fn test_fragment_starts_mid_block() {
    let (_temp, wal_path) = setup_temp_wal();
    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();

    writer.write(&vec![b'a'; 1000]).unwrap();
    writer.write(&vec![b'b'; 97270]).unwrap();

    let recs = physical_records(&fs::read(&wal_path).unwrap());
    assert_eq!(recs[0], (1, 1000, 0));
    // FIRST fills the rest of block 0
    assert_eq!(recs[1], (2, BLOCK_SIZE - 2 * HEADER_SIZE - 1000, HEADER_SIZE + 1000));
    assert_eq!(recs.last().unwrap().0, 4);
    assert!(recs.last().unwrap().2 >= BLOCK_SIZE);
}

// =============================================================================
// Size Limit Tests
// =============================================================================

#[test]
fn test_payload_too_large_rejected_before_writing() {
    let (_temp, wal_path) = setup_temp_wal();
    let config = WalConfig::builder().max_record_size(1024).build().unwrap();
    let writer = WalWriter::open(&wal_path, config).unwrap();

    writer.write(&vec![0u8; 1024]).unwrap();
    let len = writer.len().unwrap();

    let err = writer.write(&vec![0u8; 1025]).unwrap_err();
    assert!(matches!(err, WalError::PayloadTooLarge { len: 1025, limit: 1024 }));
    assert_eq!(writer.len().unwrap(), len);
}

// =============================================================================
// Checkpoint Tests
// =============================================================================

#[test]
fn test_checkpoint_truncates_and_resets_offset() {
    let (_temp, wal_path) = setup_temp_wal();
    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();

    writer.write(&vec![b'c'; 5000]).unwrap();
    assert!(writer.block_offset() > 0);

    writer.checkpoint().unwrap();
    assert_eq!(writer.len().unwrap(), 0);
    assert_eq!(writer.block_offset(), 0);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
}

#[test]
fn test_checkpoint_twice_is_idempotent() {
    let (_temp, wal_path) = setup_temp_wal();
    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();
    writer.write(b"doomed").unwrap();

    writer.checkpoint().unwrap();
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
    writer.checkpoint().unwrap();
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);

    let records = WalReader::open(&wal_path).unwrap().read_all().unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_write_after_checkpoint_starts_at_zero() {
    let (_temp, wal_path) = setup_temp_wal();
    let writer = WalWriter::open(&wal_path, WalConfig::default()).unwrap();

    writer.write(&vec![b'x'; BLOCK_SIZE + 17]).unwrap();
    writer.checkpoint().unwrap();
    writer.write(b"fresh").unwrap();

    let raw = fs::read(&wal_path).unwrap();
    assert_eq!(raw.len(), HEADER_SIZE + 5);
    assert_eq!(physical_records(&raw), vec![(1, 5, 0)]);

    let records = WalReader::open(&wal_path).unwrap().read_all().unwrap();
    assert_eq!(records, vec![b"fresh".to_vec()]);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writes_are_serialized() {
    let (_temp, wal_path) = setup_temp_wal();
    let writer = Arc::new(WalWriter::open(&wal_path, WalConfig::default()).unwrap());

    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let writer = Arc::clone(&writer);
            std::thread::spawn(move || {
                for i in 0..25usize {
                    // Sizes chosen so some records span blocks
                    let len = 1 + (i * 1531 + t as usize * 977) % 40_000;
                    writer.write(&vec![b'a' + t; len]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = WalReader::open(&wal_path).unwrap().read_all().unwrap();
    assert_eq!(records.len(), 100);
    for record in &records {
        // Every record is one writer's bytes, never interleaved
        let first = record[0];
        assert!(record.iter().all(|&b| b == first));
    }
}
