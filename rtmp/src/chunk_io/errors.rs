use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkDeserializationError {
    /// Type 1, 2 and 3 chunks copy fields from the previous header on their chunk stream, so
    /// one of them arriving before any type 0 chunk cannot be resolved
    #[error("Received chunk with non-zero chunk type on csid {csid} prior to receiving a type 0 chunk")]
    NoPreviousChunkOnStream { csid: u32 },

    #[error("Requested an invalid max chunk size of {chunk_size}, it must be between 1 and 2147483647")]
    InvalidMaxChunkSize { chunk_size: usize },

    #[error("Chunk framer was asked to handle the non-chunk parse state {state}")]
    UnexpectedParseState { state: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkSerializationError {
    #[error("Message of {size} bytes does not fit the 3 byte message length field")]
    MessageTooLong { size: usize },

    #[error("Chunk stream id {csid} is outside of the encodable range 2 to 65599")]
    InvalidChunkStreamId { csid: u32 },

    #[error("Requested an invalid max chunk size of {chunk_size}, it must be between 1 and 2147483647")]
    InvalidMaxChunkSize { chunk_size: u32 },
}
