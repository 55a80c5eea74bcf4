use crate::chunk_io::ChunkSerializationError;
use crate::messages::{MessageSerializationError, MessageType};
use thiserror::Error;

/// Errors raised by session level operations.  None of them end the connection on their own.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Every chunk stream id between 3 and 65599 is in use
    #[error("No chunk stream ids are available")]
    ChunkStreamIdsExhausted,

    #[error("No message stream ids are available")]
    MessageStreamIdsExhausted,

    /// Each message stream accepts one handler per message type
    #[error("Message stream {message_stream_id} already has a handler for {message_type}")]
    HandlerAlreadyRegistered {
        message_stream_id: u32,
        message_type: MessageType,
    },

    #[error("Message stream {message_stream_id} does not exist")]
    MessageStreamNotFound { message_stream_id: u32 },

    #[error("Failed to split an outbound message into chunks: {0}")]
    ChunkSerialization(#[from] ChunkSerializationError),

    #[error("Failed to encode an outbound message: {0}")]
    MessageSerialization(#[from] MessageSerializationError),

    /// The connection's writer is gone
    #[error("The session has been closed")]
    SessionClosed,
}
