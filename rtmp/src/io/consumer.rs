use super::budget::ReadBudget;
use super::{ConnectionError, ParseState, StepResult};
use crate::chunk_io::ChunkDeserializer;
use crate::handshake::Handshake;
use crate::messages::types::aggregate;
use crate::messages::{MessagePayload, MessageType, RtmpMessage, UserControlEvent};
use crate::sessions::{ControlProtocol, RtmpSession};
use bytes::{Buf, Bytes, BytesMut};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// The connection owns exactly one of these at a time.  Leaving the handshake drops the
/// `Handshake`, which wipes the random bytes it sent in S1.
enum Phase {
    Handshaking(Handshake),
    Chunking(ChunkDeserializer),
}

/// Drives the parse state machine over the bytes the producer hands over
pub struct Consumer {
    phase: Phase,
    state: ParseState,
    buffer: BytesMut,
    control: ControlProtocol,
    session: Arc<RtmpSession>,
    budget: Arc<ReadBudget>,
}

impl Consumer {
    pub fn new(session: Arc<RtmpSession>, control: ControlProtocol, budget: Arc<ReadBudget>) -> Consumer {
        Consumer {
            phase: Phase::Handshaking(Handshake::new()),
            state: ParseState::HandshakeC0C1,
            buffer: BytesMut::new(),
            control,
            session,
            budget,
        }
    }

    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<Bytes>,
        cancel: CancellationToken,
    ) -> Result<(), ConnectionError> {
        loop {
            let bytes = tokio::select! {
                _ = cancel.cancelled() => break,
                bytes = receiver.recv() => match bytes {
                    Some(bytes) => bytes,
                    None => break,
                },
            };

            self.process(&bytes)?;
            if self.session.is_closed() {
                break;
            }
        }

        Ok(())
    }

    /// Runs handlers until one needs more data than is buffered
    pub fn process(&mut self, input: &[u8]) -> Result<(), ConnectionError> {
        self.buffer.extend_from_slice(input);

        let mut framed_bytes = 0;
        loop {
            let step = match &mut self.phase {
                Phase::Handshaking(handshake) => {
                    handshake_step(handshake, self.state, &self.buffer, &self.session)?
                }

                Phase::Chunking(framer) => framer.step(self.state, &self.buffer)?,
            };

            match step {
                StepResult::NeedMoreData => break,

                StepResult::Advanced { consumed, next } => {
                    self.buffer.advance(consumed);
                    if let Phase::Chunking(_) = self.phase {
                        framed_bytes += consumed;
                    }

                    self.state = next;
                    if next == ParseState::FirstByteBasicHeader {
                        self.finish_handshake();
                    }
                }

                StepResult::MessageCompleted { consumed, message } => {
                    self.buffer.advance(consumed);
                    framed_bytes += consumed;
                    self.state = ParseState::FirstByteBasicHeader;

                    if let Phase::Chunking(framer) = &mut self.phase {
                        handle_message(framer, &mut self.control, &self.budget, &self.session, message)?;
                    }
                }
            }
        }

        if framed_bytes > 0 {
            self.control.record_received(framed_bytes, &self.session)?;
        }

        Ok(())
    }

    fn finish_handshake(&mut self) {
        if let Phase::Handshaking(_) = self.phase {
            self.phase = Phase::Chunking(ChunkDeserializer::new());
            self.budget.complete_handshake();
            debug!(connection_id = self.session.connection_id(), "Handshake completed");
        }
    }
}

fn handshake_step(
    handshake: &mut Handshake,
    state: ParseState,
    input: &[u8],
    session: &RtmpSession,
) -> Result<StepResult, ConnectionError> {
    match state {
        ParseState::HandshakeC0C1 => match handshake.process_c0_c1(input)? {
            Some((consumed, reply)) => {
                session.outbound().send_raw(reply.s0_s1)?;
                session.outbound().send_raw(reply.s2)?;
                Ok(StepResult::Advanced {
                    consumed,
                    next: ParseState::HandshakeC2,
                })
            }

            None => Ok(StepResult::NeedMoreData),
        },

        ParseState::HandshakeC2 => match handshake.process_c2(input)? {
            Some(consumed) => Ok(StepResult::Advanced {
                consumed,
                next: ParseState::FirstByteBasicHeader,
            }),

            None => Ok(StepResult::NeedMoreData),
        },

        _ => Ok(StepResult::NeedMoreData),
    }
}

fn handle_message(
    framer: &mut ChunkDeserializer,
    control: &mut ControlProtocol,
    budget: &ReadBudget,
    session: &Arc<RtmpSession>,
    message: MessagePayload,
) -> Result<(), ConnectionError> {
    trace!(
        connection_id = session.connection_id(),
        msid = message.message_stream_id,
        message_type = %message.message_type,
        length = message.data.len(),
        "Message received"
    );

    match message.message_type {
        MessageType::Aggregate => match aggregate::unpack(&message) {
            Ok(messages) => {
                for inner in messages {
                    handle_message(framer, control, budget, session, inner)?;
                }
            }

            Err(error) => warn!(
                connection_id = session.connection_id(),
                %error,
                "Dropping malformed aggregate message"
            ),
        },

        message_type if message_type.is_protocol_control() => {
            let decoded = session.codec().decode(&message)?;
            control.handle(decoded, framer, budget, session)?;
        }

        MessageType::UserControl => match session.codec().decode(&message) {
            Ok(RtmpMessage::UserControl(UserControlEvent::PingRequest { timestamp })) => {
                let response = UserControlEvent::PingResponse { timestamp };
                session.send_control(&RtmpMessage::UserControl(response))?;
            }

            Ok(other) => trace!(
                connection_id = session.connection_id(),
                message = ?other,
                "User control event received"
            ),

            Err(error) => warn!(
                connection_id = session.connection_id(),
                %error,
                "Dropping malformed user control message"
            ),
        },

        _ => session.dispatch(message),
    }

    Ok(())
}
