//! The chunk framer.  Splits outbound messages into chunks and reassembles inbound chunks into
//! messages, keeping the per chunk stream header history both directions depend on.

mod chunk_header;
mod deserializer;
mod errors;
mod serializer;

pub use self::chunk_header::{ChunkType, CONTROL_CHUNK_STREAM_ID, MAX_CHUNK_STREAM_ID, MIN_CHUNK_STREAM_ID};
pub use self::deserializer::ChunkDeserializer;
pub use self::errors::{ChunkDeserializationError, ChunkSerializationError};
pub use self::serializer::ChunkSerializer;

/// Chunk size both sides assume until a SetChunkSize message says otherwise
pub const INITIAL_CHUNK_SIZE: usize = 128;

/// Largest chunk size SetChunkSize can express
pub const MAX_CHUNK_SIZE: usize = 0x7fff_ffff;
