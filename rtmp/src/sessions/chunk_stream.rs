use super::{RtmpSession, SessionError};
use crate::io::SendCompletion;
use crate::messages::RtmpMessage;
use crate::time::RtmpTimestamp;
use std::sync::Weak;

/// An allocated chunk stream id.  The id goes back to the session when this is dropped.
pub struct ChunkStream {
    id: u32,
    session: Weak<RtmpSession>,
}

impl ChunkStream {
    pub(super) fn new(id: u32, session: Weak<RtmpSession>) -> ChunkStream {
        ChunkStream { id, session }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Encodes `message` and queues it on this chunk stream
    pub fn send(
        &self,
        message_stream_id: u32,
        timestamp: RtmpTimestamp,
        message: &RtmpMessage,
    ) -> Result<SendCompletion, SessionError> {
        let session = self.session.upgrade().ok_or(SessionError::SessionClosed)?;
        session.send_message(self.id, message_stream_id, timestamp, message)
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        if let Some(session) = self.session.upgrade() {
            session.release_chunk_stream_id(self.id);
        }
    }
}
