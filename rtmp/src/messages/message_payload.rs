use crate::messages::MessageType;
use crate::time::RtmpTimestamp;
use bytes::Bytes;

/// A complete RTMP message as seen by the chunk layer: resolved header plus undecoded body.
#[derive(PartialEq, Debug, Clone)]
pub struct MessagePayload {
    pub timestamp: RtmpTimestamp,
    pub message_type: MessageType,
    pub message_stream_id: u32,
    pub data: Bytes,
}

impl MessagePayload {
    pub fn new(
        timestamp: RtmpTimestamp,
        message_type: MessageType,
        message_stream_id: u32,
        data: Bytes,
    ) -> MessagePayload {
        MessagePayload {
            timestamp,
            message_type,
            message_stream_id,
            data,
        }
    }
}
