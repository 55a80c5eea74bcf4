use super::types::{command, control, data, user_control};
use super::{
    MessageDeserializationError, MessagePayload, MessageSerializationError, MessageType,
    ObjectEncoding, RtmpMessage,
};
use bytes::Bytes;

/// Converts between chunk layer payloads and decoded messages.  The framer and the session
/// never interpret payload bytes themselves, they go through this trait.
pub trait MessageCodec: Send + Sync {
    fn decode(&self, payload: &MessagePayload) -> Result<RtmpMessage, MessageDeserializationError>;

    fn encode(
        &self,
        message: &RtmpMessage,
    ) -> Result<(MessageType, Bytes), MessageSerializationError>;
}

/// Codec covering control, user control, audio/video and AMF0 based command and data messages.
/// Shared object messages are passed through as `RtmpMessage::Unknown`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCodec;

impl MessageCodec for StandardCodec {
    fn decode(&self, payload: &MessagePayload) -> Result<RtmpMessage, MessageDeserializationError> {
        let bytes = &payload.data[..];
        match payload.message_type {
            MessageType::SetChunkSize => control::deserialize_set_chunk_size(bytes),
            MessageType::Abort => control::deserialize_abort(bytes),
            MessageType::Acknowledgement => control::deserialize_acknowledgement(bytes),
            MessageType::UserControl => user_control::deserialize(bytes),
            MessageType::WindowAcknowledgementSize => {
                control::deserialize_window_acknowledgement_size(bytes)
            }
            MessageType::SetPeerBandwidth => control::deserialize_set_peer_bandwidth(bytes),
            MessageType::Audio => Ok(RtmpMessage::AudioData {
                data: payload.data.clone(),
            }),
            MessageType::Video => Ok(RtmpMessage::VideoData {
                data: payload.data.clone(),
            }),
            MessageType::Amf0Command => command::deserialize(bytes, ObjectEncoding::Amf0),
            MessageType::Amf3Command => command::deserialize(bytes, ObjectEncoding::Amf3),
            MessageType::Amf0Data => data::deserialize(bytes, ObjectEncoding::Amf0),
            MessageType::Amf3Data => data::deserialize(bytes, ObjectEncoding::Amf3),
            other => Ok(RtmpMessage::Unknown {
                type_id: other.id(),
                data: payload.data.clone(),
            }),
        }
    }

    fn encode(
        &self,
        message: &RtmpMessage,
    ) -> Result<(MessageType, Bytes), MessageSerializationError> {
        let bytes = match message {
            RtmpMessage::SetChunkSize { size } => control::serialize_set_chunk_size(*size),
            RtmpMessage::Abort { chunk_stream_id } => control::serialize_u32(*chunk_stream_id),
            RtmpMessage::Acknowledgement { sequence_number } => {
                control::serialize_u32(*sequence_number)
            }
            RtmpMessage::UserControl(event) => user_control::serialize(event),
            RtmpMessage::WindowAcknowledgementSize { size } => control::serialize_u32(*size),
            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                control::serialize_set_peer_bandwidth(*size, *limit_type)
            }
            RtmpMessage::AudioData { data } | RtmpMessage::VideoData { data } => data.clone(),
            RtmpMessage::Command(command) => command::serialize(command)?,
            RtmpMessage::Data(message) => data::serialize(message)?,
            RtmpMessage::Unknown { data, .. } => data.clone(),
        };

        Ok((message.message_type(), bytes))
    }
}
