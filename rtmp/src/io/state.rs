use crate::messages::MessagePayload;

/// Named states of the inbound parsing state machine.  The first two belong to the handshake,
/// the rest to the chunk framer.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ParseState {
    HandshakeC0C1,
    HandshakeC2,
    FirstByteBasicHeader,
    ChunkMessageHeader,
    ExtendedTimestamp,
    CompleteMessage,
}

/// Outcome of running the handler for one state against the unconsumed input
#[derive(Debug)]
pub enum StepResult {
    /// Nothing was consumed; wait for the next read
    NeedMoreData,

    Advanced { consumed: usize, next: ParseState },

    /// A chunk completed a message.  Parsing restarts at `FirstByteBasicHeader`.
    MessageCompleted {
        consumed: usize,
        message: MessagePayload,
    },
}
