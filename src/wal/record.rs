//! Physical record definitions
//!
//! Header layout, record type codes and the record checksum.

/// Size of one log block. Physical records never straddle a block boundary.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// checksum (4) + length (2) + type (1)
pub const HEADER_SIZE: usize = 4 + 2 + 1;

/// Largest fragment one physical record can carry
pub const MAX_FRAGMENT_SIZE: usize = BLOCK_SIZE - HEADER_SIZE;

/// Position of a physical record within its logical record
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// The whole logical record
    Full = 1,
    /// Opening fragment
    First = 2,
    /// Interior fragment
    Middle = 3,
    /// Closing fragment
    Last = 4,
}

impl RecordType {
    /// On-disk type code
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Classify a fragment from where it sits in the logical record
    pub fn for_fragment(is_first: bool, is_last: bool) -> Self {
        match (is_first, is_last) {
            (true, true) => RecordType::Full,
            (true, false) => RecordType::First,
            (false, true) => RecordType::Last,
            (false, false) => RecordType::Middle,
        }
    }
}

impl TryFrom<u8> for RecordType {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, u8> {
        match code {
            1 => Ok(RecordType::Full),
            2 => Ok(RecordType::First),
            3 => Ok(RecordType::Middle),
            4 => Ok(RecordType::Last),
            other => Err(other),
        }
    }
}

/// CRC-32 (IEEE) over the type byte followed by the payload
pub fn compute_checksum(record_type: u8, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[record_type]);
    hasher.update(payload);
    hasher.finalize()
}

/// Decoded 7-byte record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub checksum: u32,
    pub length: u16,
    /// Raw type code; may be invalid when read back from a damaged file
    pub record_type: u8,
}

impl RecordHeader {
    /// Build the header for a fragment, computing its checksum
    ///
    /// The caller guarantees `payload.len() <= MAX_FRAGMENT_SIZE`.
    pub fn for_payload(record_type: RecordType, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= MAX_FRAGMENT_SIZE);
        Self {
            checksum: compute_checksum(record_type.as_u8(), payload),
            length: payload.len() as u16,
            record_type: record_type.as_u8(),
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.checksum.to_le_bytes());
        buf[4..6].copy_from_slice(&self.length.to_le_bytes());
        buf[6] = self.record_type;
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            checksum: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            length: u16::from_le_bytes([buf[4], buf[5]]),
            record_type: buf[6],
        }
    }

    /// Zeroed header left by a padding run or a preallocated region
    pub fn is_padding(&self) -> bool {
        self.checksum == 0 && self.length == 0 && RecordType::try_from(self.record_type).is_err()
    }

    /// Check a payload read back from disk against this header
    pub fn matches(&self, payload: &[u8]) -> bool {
        compute_checksum(self.record_type, payload) == self.checksum
    }
}
