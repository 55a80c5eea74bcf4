use super::rpc::RpcContext;
use super::{ChunkStream, InboundMessage, MessageHandler, RtmpSession, SessionError};
use crate::io::SendCompletion;
use crate::messages::{CommandMessage, MessageType, RtmpMessage};
use crate::time::RtmpTimestamp;
use rtmp_amf0::Amf0Value;
use std::sync::Arc;
use tracing::debug;

const ROUTED_MESSAGE_TYPES: [MessageType; 6] = [
    MessageType::Amf0Command,
    MessageType::Amf3Command,
    MessageType::Audio,
    MessageType::Video,
    MessageType::Amf0Data,
    MessageType::Amf3Data,
];

/// A stream created by `createStream`.  Its messages travel on its own message stream and
/// chunk stream.
pub struct NetStream {
    id: u32,
    chunk_stream: ChunkStream,
}

impl NetStream {
    pub(super) fn open(session: &Arc<RtmpSession>) -> Result<Arc<NetStream>, SessionError> {
        let chunk_stream = session.create_chunk_stream()?;
        let message_stream = session.create_message_stream()?;

        let handler: Arc<dyn MessageHandler> = Arc::new(NetStreamHandler);
        for message_type in ROUTED_MESSAGE_TYPES {
            if let Err(error) = message_stream.register_handler(message_type, handler.clone()) {
                session.remove_message_stream(message_stream.id());
                return Err(error);
            }
        }

        Ok(Arc::new(NetStream {
            id: message_stream.id(),
            chunk_stream,
        }))
    }

    /// The message stream id
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn chunk_stream_id(&self) -> u32 {
        self.chunk_stream.id()
    }

    pub fn send(
        &self,
        timestamp: RtmpTimestamp,
        message: &RtmpMessage,
    ) -> Result<SendCompletion, SessionError> {
        self.chunk_stream.send(self.id, timestamp, message)
    }
}

/// Routes commands on a NetStream to the app's controller, and hands media and data messages
/// to it as they arrive
struct NetStreamHandler;

impl MessageHandler for NetStreamHandler {
    fn handle(&self, session: &Arc<RtmpSession>, message: InboundMessage) -> Result<(), SessionError> {
        let stream_id = message.message_stream_id;
        let command = match &message.message {
            RtmpMessage::Command(command) => command,
            _ => {
                if let Some(rpc) = session.rpc_service() {
                    let context = RpcContext {
                        session,
                        message_stream_id: stream_id,
                    };

                    rpc.controller().on_stream_message(&context, &message);
                }

                return Ok(());
            }
        };

        match command.procedure_name.as_str() {
            "closeStream" => {
                session.delete_net_stream(stream_id);
                Ok(())
            }

            "deleteStream" => {
                let target = command
                    .arguments
                    .first()
                    .and_then(Amf0Value::as_number)
                    .map(|id| id as u32)
                    .unwrap_or(stream_id);

                session.delete_net_stream(target);
                Ok(())
            }

            _ => call(session, stream_id, command),
        }
    }
}

fn call(session: &Arc<RtmpSession>, stream_id: u32, command: &CommandMessage) -> Result<(), SessionError> {
    let rpc = match session.rpc_service() {
        Some(rpc) => rpc,
        None => return Ok(()),
    };

    let context = RpcContext {
        session,
        message_stream_id: stream_id,
    };

    let reply = match rpc.call(&context, command) {
        Some(reply) => reply,
        None => return Ok(()),
    };

    // The procedure may have closed the stream it was called on
    match session.net_stream(stream_id) {
        Some(stream) => {
            stream.send(RtmpTimestamp::new(0), &RtmpMessage::Command(reply))?;
        }

        None => debug!(
            connection_id = session.connection_id(),
            msid = stream_id,
            "Stream closed before its reply was sent"
        ),
    }

    Ok(())
}
