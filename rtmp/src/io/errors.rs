use crate::chunk_io::ChunkDeserializationError;
use crate::handshake::HandshakeError;
use crate::messages::MessageDeserializationError;
use crate::sessions::SessionError;
use std::io;
use thiserror::Error;

/// Reasons a connection pipeline stopped.  Each one ends only the connection it happened on.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Socket error: {0}")]
    Io(#[from] io::Error),

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Chunk framing failed: {0}")]
    ChunkDeserialization(#[from] ChunkDeserializationError),

    #[error("Protocol control message was malformed: {0}")]
    MessageDeserialization(#[from] MessageDeserializationError),

    #[error("{0}")]
    Session(#[from] SessionError),
}
