use crate::messages::MessageType;
use crate::time::RtmpTimestamp;

pub const MIN_CHUNK_STREAM_ID: u32 = 2;
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

/// Chunk stream reserved for protocol control and NetConnection traffic
pub const CONTROL_CHUNK_STREAM_ID: u32 = 2;

/// 3 byte timestamp value announcing a trailing 4 byte extended timestamp
pub(super) const EXTENDED_TIMESTAMP_MARKER: u32 = 0x00ff_ffff;

/// Chunk format from the top two bits of the basic header
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ChunkType {
    /// Absolute timestamp, length, type and message stream id
    Type0,
    /// Timestamp delta, length and type
    Type1,
    /// Timestamp delta only
    Type2,
    /// Nothing, every field comes from the previous header
    Type3,
}

impl ChunkType {
    pub fn from_basic_header_byte(byte: u8) -> ChunkType {
        match byte >> 6 {
            0 => ChunkType::Type0,
            1 => ChunkType::Type1,
            2 => ChunkType::Type2,
            _ => ChunkType::Type3,
        }
    }

    pub fn format_bits(&self) -> u8 {
        match self {
            ChunkType::Type0 => 0b0000_0000,
            ChunkType::Type1 => 0b0100_0000,
            ChunkType::Type2 => 0b1000_0000,
            ChunkType::Type3 => 0b1100_0000,
        }
    }

    pub fn message_header_size(&self) -> usize {
        match self {
            ChunkType::Type0 => 11,
            ChunkType::Type1 => 7,
            ChunkType::Type2 => 3,
            ChunkType::Type3 => 0,
        }
    }
}

/// Fully resolved header of the last chunk seen (or sent) on a chunk stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct PreviousHeader {
    pub timestamp: RtmpTimestamp,
    pub message_length: u32,
    pub message_type: MessageType,
    pub message_stream_id: u32,

    /// The timestamp quantity the last non type 3 header carried at full width: absolute for
    /// type 0, a delta for types 1 and 2.  Type 3 chunks after it carry the same extended
    /// timestamp when it does not fit in 3 bytes.
    pub timestamp_field: u32,
}

impl PreviousHeader {
    pub fn uses_extended_timestamp(&self) -> bool {
        self.timestamp_field >= EXTENDED_TIMESTAMP_MARKER
    }
}

/// Number of bytes the basic header for `csid` takes on the wire
pub(super) fn basic_header_size(csid: u32) -> usize {
    match csid {
        0..=63 => 1,
        64..=319 => 2,
        _ => 3,
    }
}

/// Parses a basic header, returning the chunk stream id and the bytes it took.  `None` means
/// the input does not hold the whole header yet.
pub(super) fn read_basic_header(input: &[u8]) -> Option<(ChunkType, u32, usize)> {
    let first = *input.first()?;
    let chunk_type = ChunkType::from_basic_header_byte(first);
    match first & 0b0011_1111 {
        0 => {
            let second = *input.get(1)?;
            Some((chunk_type, second as u32 + 64, 2))
        }

        1 => {
            let second = *input.get(1)? as u32;
            let third = *input.get(2)? as u32;
            Some((chunk_type, third * 256 + second + 64, 3))
        }

        csid => Some((chunk_type, csid as u32, 1)),
    }
}

pub(super) fn write_basic_header(bytes: &mut Vec<u8>, chunk_type: ChunkType, csid: u32) {
    let format = chunk_type.format_bits();
    match basic_header_size(csid) {
        1 => bytes.push(format | csid as u8),
        2 => {
            bytes.push(format);
            bytes.push((csid - 64) as u8);
        }
        _ => {
            let value = csid - 64;
            bytes.push(format | 1);
            bytes.push((value & 0xff) as u8);
            bytes.push((value >> 8) as u8);
        }
    }
}
