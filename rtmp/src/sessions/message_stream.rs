use super::{RtmpSession, SessionError};
use crate::lock;
use crate::messages::{MessageType, RtmpMessage};
use crate::time::RtmpTimestamp;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A decoded message together with the header fields handlers care about
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub timestamp: RtmpTimestamp,
    pub message_stream_id: u32,
    pub message: RtmpMessage,
}

/// Receives the messages of one type on one message stream
pub trait MessageHandler: Send + Sync {
    fn handle(&self, session: &Arc<RtmpSession>, message: InboundMessage) -> Result<(), SessionError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Arc<RtmpSession>, InboundMessage) -> Result<(), SessionError> + Send + Sync,
{
    fn handle(&self, session: &Arc<RtmpSession>, message: InboundMessage) -> Result<(), SessionError> {
        self(session, message)
    }
}

/// A logical channel on the connection, identified by its message stream id.  Messages are
/// routed to handlers by message type.
pub struct MessageStream {
    id: u32,
    handlers: Mutex<HashMap<MessageType, Arc<dyn MessageHandler>>>,
}

impl MessageStream {
    pub fn new(id: u32) -> MessageStream {
        MessageStream {
            id,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Fails if the stream already has a handler for `message_type`
    pub fn register_handler(
        &self,
        message_type: MessageType,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), SessionError> {
        let mut handlers = lock(&self.handlers);
        if handlers.contains_key(&message_type) {
            return Err(SessionError::HandlerAlreadyRegistered {
                message_stream_id: self.id,
                message_type,
            });
        }

        handlers.insert(message_type, handler);
        Ok(())
    }

    /// Handler for `message_type`, if one is registered.  The clone lets callers invoke it
    /// without holding the stream's lock.
    pub fn handler(&self, message_type: MessageType) -> Option<Arc<dyn MessageHandler>> {
        lock(&self.handlers).get(&message_type).cloned()
    }

    pub fn clear_handlers(&self) {
        lock(&self.handlers).clear();
    }
}
