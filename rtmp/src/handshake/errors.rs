use thiserror::Error;

/// Protocol violations detected while negotiating the RTMP handshake.  Every variant is fatal
/// for the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("Peer requested RTMP version {version}, only versions 3 through 31 are accepted")]
    UnsupportedVersion { version: u8 },

    #[error("C1's second time field was expected to be zero")]
    NonZeroedTimeInC1,

    #[error("C2 echoed epoch {received} but S1 carried {expected}")]
    IncorrectPeerTime { expected: u32, received: u32 },

    #[error("C2 did not echo the random bytes sent in S1")]
    IncorrectRandomData,

    #[error("Handshake bytes were processed after the handshake had already completed")]
    AlreadyCompleted,
}
