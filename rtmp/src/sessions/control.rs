use super::{RtmpSession, SessionError};
use crate::chunk_io::ChunkDeserializer;
use crate::io::{ConnectionError, ReadBudget, WindowState};
use crate::messages::RtmpMessage;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{debug, trace};

/// Applies the protocol control messages a peer sends and produces the acknowledgements it
/// is owed.  Owned by the connection's consumer loop.
pub struct ControlProtocol {
    window: WindowState,
}

impl ControlProtocol {
    pub fn new(write_counter: Arc<AtomicU64>) -> ControlProtocol {
        ControlProtocol {
            window: WindowState::new(write_counter),
        }
    }

    pub fn window(&self) -> &WindowState {
        &self.window
    }

    pub fn handle(
        &mut self,
        message: RtmpMessage,
        framer: &mut ChunkDeserializer,
        budget: &ReadBudget,
        session: &RtmpSession,
    ) -> Result<(), ConnectionError> {
        let connection_id = session.connection_id();
        match message {
            RtmpMessage::SetChunkSize { size } => {
                framer.set_max_chunk_size(size as usize)?;
                budget.set_read_chunk_size(size as usize);
                debug!(connection_id, size, "Read chunk size changed");
            }

            RtmpMessage::Abort { chunk_stream_id } => framer.abort_message(chunk_stream_id),

            RtmpMessage::Acknowledgement { sequence_number } => {
                self.window.acknowledge_written(sequence_number);
                trace!(connection_id, sequence_number, "Peer acknowledged bytes");
            }

            RtmpMessage::WindowAcknowledgementSize { size } => {
                self.window.set_read_window_ack_size(size);
                debug!(connection_id, size, "Read window acknowledgement size changed");
            }

            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                if self.window.apply_peer_bandwidth(size, limit_type) {
                    session.send_control(&RtmpMessage::WindowAcknowledgementSize { size })?;
                    debug!(connection_id, size, ?limit_type, "Peer bandwidth applied");
                } else {
                    debug!(connection_id, size, ?limit_type, "Peer bandwidth ignored");
                }
            }

            other => trace!(
                connection_id,
                message_type = %other.message_type(),
                "Not a protocol control message"
            ),
        }

        Ok(())
    }

    /// Counts bytes the framer consumed and sends an Acknowledgement when the read window fills
    pub fn record_received(&mut self, count: usize, session: &RtmpSession) -> Result<(), SessionError> {
        if let Some(sequence_number) = self.window.record_received(count) {
            trace!(connection_id = session.connection_id(), sequence_number, "Acknowledging bytes");
            session.send_control(&RtmpMessage::Acknowledgement { sequence_number })?;
        }

        Ok(())
    }
}
