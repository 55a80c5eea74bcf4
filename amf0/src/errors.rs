use std::{io, string};
use thiserror::Error;

/// Errors raised while reading AMF0 encoded bytes
#[derive(Debug, Error)]
pub enum Amf0DeserializationError {
    #[error("Encountered unknown AMF0 marker {marker:#04x}")]
    UnknownMarker { marker: u8 },

    /// An empty property name must be followed by the object end marker
    #[error("Empty object property name was not followed by an object end marker")]
    UnexpectedEmptyObjectPropertyName,

    #[error("Objects and arrays are nested more than {limit} levels deep")]
    NestingTooDeep { limit: usize },

    #[error("Byte buffer ended in the middle of a value")]
    UnexpectedEof,

    #[error("String was not valid utf8: {0}")]
    InvalidUtf8(#[from] string::FromUtf8Error),

    #[error("{0}")]
    Io(io::Error),
}

impl From<io::Error> for Amf0DeserializationError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => Amf0DeserializationError::UnexpectedEof,
            _ => Amf0DeserializationError::Io(error),
        }
    }
}

/// Errors raised while writing AMF0 values
#[derive(Debug, Error)]
pub enum Amf0SerializationError {
    #[error("Object property name is {length} bytes long, the limit is 65535")]
    PropertyNameTooLong { length: usize },

    #[error("Array has {length} entries which exceeds the u32 length prefix")]
    ArrayTooLong { length: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}
