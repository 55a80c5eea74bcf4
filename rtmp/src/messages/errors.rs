use rtmp_amf0::{Amf0DeserializationError, Amf0SerializationError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageDeserializationError {
    #[error("Message payload ended before all expected fields were read")]
    UnexpectedEndOfPayload,

    #[error("Command message did not start with a procedure name and transaction id")]
    InvalidCommandFormat,

    #[error("SetPeerBandwidth carried unknown limit type {limit_type}")]
    InvalidPeerBandwidthLimitType { limit_type: u8 },

    #[error("UserControl carried unknown event type {event_type}")]
    UnknownUserControlEvent { event_type: u16 },

    #[error("Aggregate sub-message at offset {offset} runs past the end of the payload")]
    TruncatedAggregate { offset: usize },

    #[error("Failed to read AMF0 values: {0}")]
    Amf0(#[from] Amf0DeserializationError),

    #[error("{0}")]
    Io(io::Error),
}

impl From<io::Error> for MessageDeserializationError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => MessageDeserializationError::UnexpectedEndOfPayload,
            _ => MessageDeserializationError::Io(error),
        }
    }
}

#[derive(Debug, Error)]
pub enum MessageSerializationError {
    #[error("Failed to write AMF0 values: {0}")]
    Amf0(#[from] Amf0SerializationError),

    #[error("{0}")]
    Io(#[from] io::Error),
}
