//! Protocol control messages.  Each body is a single big endian u32, except SetPeerBandwidth
//! which appends a one byte limit type.

use crate::messages::{MessageDeserializationError, PeerBandwidthLimitType, RtmpMessage};
use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// SetChunkSize only has 31 usable bits
const CHUNK_SIZE_MASK: u32 = 0x7fff_ffff;

pub fn serialize_u32(value: u32) -> Bytes {
    let mut bytes = BytesMut::with_capacity(4);
    bytes.put_u32(value);
    bytes.freeze()
}

pub fn serialize_set_chunk_size(size: u32) -> Bytes {
    serialize_u32(size & CHUNK_SIZE_MASK)
}

pub fn serialize_set_peer_bandwidth(size: u32, limit_type: PeerBandwidthLimitType) -> Bytes {
    let mut bytes = BytesMut::with_capacity(5);
    bytes.put_u32(size);
    bytes.put_u8(match limit_type {
        PeerBandwidthLimitType::Hard => 0,
        PeerBandwidthLimitType::Soft => 1,
        PeerBandwidthLimitType::Dynamic => 2,
    });

    bytes.freeze()
}

pub fn deserialize_set_chunk_size(data: &[u8]) -> Result<RtmpMessage, MessageDeserializationError> {
    let size = read_u32(data)? & CHUNK_SIZE_MASK;
    Ok(RtmpMessage::SetChunkSize { size })
}

pub fn deserialize_abort(data: &[u8]) -> Result<RtmpMessage, MessageDeserializationError> {
    let chunk_stream_id = read_u32(data)?;
    Ok(RtmpMessage::Abort { chunk_stream_id })
}

pub fn deserialize_acknowledgement(
    data: &[u8],
) -> Result<RtmpMessage, MessageDeserializationError> {
    let sequence_number = read_u32(data)?;
    Ok(RtmpMessage::Acknowledgement { sequence_number })
}

pub fn deserialize_window_acknowledgement_size(
    data: &[u8],
) -> Result<RtmpMessage, MessageDeserializationError> {
    let size = read_u32(data)?;
    Ok(RtmpMessage::WindowAcknowledgementSize { size })
}

pub fn deserialize_set_peer_bandwidth(
    data: &[u8],
) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let size = cursor.read_u32::<BigEndian>()?;
    let limit_type = match cursor.read_u8()? {
        0 => PeerBandwidthLimitType::Hard,
        1 => PeerBandwidthLimitType::Soft,
        2 => PeerBandwidthLimitType::Dynamic,
        limit_type => {
            return Err(MessageDeserializationError::InvalidPeerBandwidthLimitType { limit_type })
        }
    };

    Ok(RtmpMessage::SetPeerBandwidth { size, limit_type })
}

fn read_u32(data: &[u8]) -> Result<u32, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    Ok(cursor.read_u32::<BigEndian>()?)
}
