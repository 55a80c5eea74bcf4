/*!
RTMP message model.

A `MessagePayload` is what the chunk layer produces and consumes: a resolved header plus opaque
payload bytes.  An `RtmpMessage` is the decoded form, produced from a payload by a
`MessageCodec`.  The framer never looks inside payloads.
*/

mod codec;
mod errors;
mod message_payload;
pub mod types;

pub use self::codec::{MessageCodec, StandardCodec};
pub use self::errors::{MessageDeserializationError, MessageSerializationError};
pub use self::message_payload::MessagePayload;

use crate::time::RtmpTimestamp;
use bytes::Bytes;
use rtmp_amf0::Amf0Value;
use std::collections::HashMap;
use std::fmt;

/// Wire tag of an RTMP message
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy)]
pub enum MessageType {
    SetChunkSize,
    Abort,
    Acknowledgement,
    UserControl,
    WindowAcknowledgementSize,
    SetPeerBandwidth,
    Audio,
    Video,
    Amf3Data,
    Amf3SharedObject,
    Amf3Command,
    Amf0Data,
    Amf0SharedObject,
    Amf0Command,
    Aggregate,
    Other(u8),
}

impl MessageType {
    pub fn id(&self) -> u8 {
        match self {
            MessageType::SetChunkSize => 1,
            MessageType::Abort => 2,
            MessageType::Acknowledgement => 3,
            MessageType::UserControl => 4,
            MessageType::WindowAcknowledgementSize => 5,
            MessageType::SetPeerBandwidth => 6,
            MessageType::Audio => 8,
            MessageType::Video => 9,
            MessageType::Amf3Data => 15,
            MessageType::Amf3SharedObject => 16,
            MessageType::Amf3Command => 17,
            MessageType::Amf0Data => 18,
            MessageType::Amf0SharedObject => 19,
            MessageType::Amf0Command => 20,
            MessageType::Aggregate => 22,
            MessageType::Other(id) => *id,
        }
    }

    /// Protocol control messages (types 1, 2, 3, 5 and 6) which always travel on message
    /// stream 0 and configure the connection itself
    pub fn is_protocol_control(&self) -> bool {
        matches!(
            self,
            MessageType::SetChunkSize
                | MessageType::Abort
                | MessageType::Acknowledgement
                | MessageType::WindowAcknowledgementSize
                | MessageType::SetPeerBandwidth
        )
    }
}

impl From<u8> for MessageType {
    fn from(id: u8) -> Self {
        match id {
            1 => MessageType::SetChunkSize,
            2 => MessageType::Abort,
            3 => MessageType::Acknowledgement,
            4 => MessageType::UserControl,
            5 => MessageType::WindowAcknowledgementSize,
            6 => MessageType::SetPeerBandwidth,
            8 => MessageType::Audio,
            9 => MessageType::Video,
            15 => MessageType::Amf3Data,
            16 => MessageType::Amf3SharedObject,
            17 => MessageType::Amf3Command,
            18 => MessageType::Amf0Data,
            19 => MessageType::Amf0SharedObject,
            20 => MessageType::Amf0Command,
            22 => MessageType::Aggregate,
            other => MessageType::Other(other),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Other(id) => write!(f, "Other({})", id),
            known => write!(f, "{:?}", known),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PeerBandwidthLimitType {
    Hard,
    Soft,
    Dynamic,
}

/// Which object encoding a command or data message body was announced with.  AMF3 flavoured
/// messages carry a leading format selector byte followed by an AMF0 body.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ObjectEncoding {
    Amf0,
    Amf3,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum UserControlEvent {
    StreamBegin { stream_id: u32 },
    StreamEof { stream_id: u32 },
    StreamDry { stream_id: u32 },
    SetBufferLength { stream_id: u32, buffer_length: u32 },
    StreamIsRecorded { stream_id: u32 },
    PingRequest { timestamp: RtmpTimestamp },
    PingResponse { timestamp: RtmpTimestamp },
}

/// A remote procedure call, including `_result` and `_error` replies
#[derive(PartialEq, Debug, Clone)]
pub struct CommandMessage {
    pub encoding: ObjectEncoding,
    pub procedure_name: String,
    pub transaction_id: f64,
    pub command_object: Amf0Value,
    pub arguments: Vec<Amf0Value>,
}

impl CommandMessage {
    pub fn new(procedure_name: &str, transaction_id: f64, command_object: Amf0Value) -> Self {
        CommandMessage {
            encoding: ObjectEncoding::Amf0,
            procedure_name: procedure_name.to_string(),
            transaction_id,
            command_object,
            arguments: Vec::new(),
        }
    }

    /// Successful reply to the call with the given transaction id
    pub fn result(transaction_id: f64, command_object: Amf0Value, value: Amf0Value) -> Self {
        let mut message = CommandMessage::new("_result", transaction_id, command_object);
        message.arguments.push(value);
        message
    }

    /// Failed reply carrying a status object with `level` set to `error`
    pub fn error(transaction_id: f64, code: &str, description: &str) -> Self {
        let mut message = CommandMessage::new("_error", transaction_id, Amf0Value::Null);
        message.arguments.push(status_object("error", code, description));
        message
    }

    pub fn with_encoding(mut self, encoding: ObjectEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct DataMessage {
    pub encoding: ObjectEncoding,
    pub values: Vec<Amf0Value>,
}

#[derive(PartialEq, Debug, Clone)]
pub enum RtmpMessage {
    SetChunkSize { size: u32 },
    Abort { chunk_stream_id: u32 },
    Acknowledgement { sequence_number: u32 },
    UserControl(UserControlEvent),
    WindowAcknowledgementSize { size: u32 },
    SetPeerBandwidth {
        size: u32,
        limit_type: PeerBandwidthLimitType,
    },
    AudioData { data: Bytes },
    VideoData { data: Bytes },
    Command(CommandMessage),
    Data(DataMessage),
    Unknown { type_id: u8, data: Bytes },
}

impl RtmpMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            RtmpMessage::SetChunkSize { .. } => MessageType::SetChunkSize,
            RtmpMessage::Abort { .. } => MessageType::Abort,
            RtmpMessage::Acknowledgement { .. } => MessageType::Acknowledgement,
            RtmpMessage::UserControl(_) => MessageType::UserControl,
            RtmpMessage::WindowAcknowledgementSize { .. } => MessageType::WindowAcknowledgementSize,
            RtmpMessage::SetPeerBandwidth { .. } => MessageType::SetPeerBandwidth,
            RtmpMessage::AudioData { .. } => MessageType::Audio,
            RtmpMessage::VideoData { .. } => MessageType::Video,
            RtmpMessage::Command(command) => match command.encoding {
                ObjectEncoding::Amf0 => MessageType::Amf0Command,
                ObjectEncoding::Amf3 => MessageType::Amf3Command,
            },
            RtmpMessage::Data(data) => match data.encoding {
                ObjectEncoding::Amf0 => MessageType::Amf0Data,
                ObjectEncoding::Amf3 => MessageType::Amf3Data,
            },
            RtmpMessage::Unknown { type_id, .. } => MessageType::from(*type_id),
        }
    }
}

/// Builds the `{level, code, description}` object used by status replies
pub fn status_object(level: &str, code: &str, description: &str) -> Amf0Value {
    let mut properties = HashMap::new();
    properties.insert("level".to_string(), Amf0Value::from(level));
    properties.insert("code".to_string(), Amf0Value::from(code));
    properties.insert("description".to_string(), Amf0Value::from(description));
    Amf0Value::Object(properties)
}
