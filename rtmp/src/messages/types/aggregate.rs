//! Aggregate messages pack several complete messages into one body.  Each sub-message is laid
//! out as an FLV tag: type (1), length (3), timestamp (3 plus a high order byte), stream id (3),
//! body, then a 4 byte back pointer.

use crate::messages::{MessageDeserializationError, MessagePayload, MessageType};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ByteOrder};
use tracing::trace;

const SUB_HEADER_SIZE: usize = 11;
const BACK_POINTER_SIZE: usize = 4;

/// Splits an aggregate into its sub-messages.
///
/// Sub-message timestamps are rebased so the first one lands on the aggregate's own timestamp
/// and later ones keep their offsets from it.  The message stream id always comes from the
/// aggregate.  Sub-messages of unknown or nested aggregate type are dropped.
pub fn unpack(aggregate: &MessagePayload) -> Result<Vec<MessagePayload>, MessageDeserializationError> {
    let data = &aggregate.data;
    let mut messages = Vec::new();
    let mut first_timestamp = None;
    let mut offset = 0;

    while offset < data.len() {
        if data.len() - offset < SUB_HEADER_SIZE {
            return Err(MessageDeserializationError::TruncatedAggregate { offset });
        }

        let header = &data[offset..offset + SUB_HEADER_SIZE];
        let message_type = MessageType::from(header[0]);
        let length = BigEndian::read_u24(&header[1..4]) as usize;
        let timestamp = BigEndian::read_u24(&header[4..7]) | ((header[7] as u32) << 24);

        let body_start = offset + SUB_HEADER_SIZE;
        let body_end = body_start + length;
        if body_end > data.len() {
            return Err(MessageDeserializationError::TruncatedAggregate { offset });
        }

        let first = *first_timestamp.get_or_insert(timestamp);
        match message_type {
            MessageType::Other(_) | MessageType::Aggregate => {
                trace!(%message_type, "Skipping unsupported aggregate sub-message");
            }

            _ => messages.push(MessagePayload {
                timestamp: aggregate.timestamp
                    + RtmpTimestamp::new(timestamp).delta_since(RtmpTimestamp::new(first)),
                message_type,
                message_stream_id: aggregate.message_stream_id,
                data: data.slice(body_start..body_end),
            }),
        }

        // The trailing back pointer is optional on the final sub-message
        offset = (body_end + BACK_POINTER_SIZE).min(data.len());
    }

    Ok(messages)
}
