use super::net_connection::{self, ConnectionInformation};
use super::registry::{StreamRegistry, CONTROL_MESSAGE_STREAM_ID};
use super::rpc::{Applications, RpcService};
use super::{ChunkStream, InboundMessage, MessageStream, NetStream, ServerConfig, SessionError};
use crate::chunk_io::CONTROL_CHUNK_STREAM_ID;
use crate::io::{OutboundQueue, SendCompletion};
use crate::lock;
use crate::messages::{MessageCodec, MessagePayload, RtmpMessage};
use crate::time::RtmpTimestamp;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

struct ConnectedApp {
    information: ConnectionInformation,
    rpc: RpcService,
}

/// The server side of one RTMP connection above the chunk layer.
///
/// A session owns the connection's message streams and hands out chunk stream ids.  Inbound
/// messages are routed to the handler registered for their message type on their message
/// stream; outbound messages are encoded and queued on the connection's single writer.
/// Application code may create and destroy streams from any thread while the connection's
/// consumer loop is dispatching.
pub struct RtmpSession {
    connection_id: u64,
    config: ServerConfig,
    codec: Arc<dyn MessageCodec>,
    applications: Arc<Applications>,
    outbound: Arc<OutboundQueue>,
    registry: Mutex<StreamRegistry<MessageStream>>,
    net_streams: Mutex<HashMap<u32, Arc<NetStream>>>,
    connection: Mutex<Option<ConnectedApp>>,
    cancel: CancellationToken,
    weak_self: Weak<RtmpSession>,
}

impl RtmpSession {
    /// Creates the session along with its control message stream, which handles the
    /// NetConnection commands
    pub fn new(
        connection_id: u64,
        config: ServerConfig,
        codec: Arc<dyn MessageCodec>,
        applications: Arc<Applications>,
        outbound: Arc<OutboundQueue>,
        cancel: CancellationToken,
    ) -> Result<Arc<RtmpSession>, SessionError> {
        let session = Arc::new_cyclic(|weak_self| RtmpSession {
            connection_id,
            config,
            codec,
            applications,
            outbound,
            registry: Mutex::new(StreamRegistry::new()),
            net_streams: Mutex::new(HashMap::new()),
            connection: Mutex::new(None),
            cancel,
            weak_self: weak_self.clone(),
        });

        let control = Arc::new(MessageStream::new(CONTROL_MESSAGE_STREAM_ID));
        net_connection::register_handlers(&control)?;
        lock(&session.registry).insert_message_stream(CONTROL_MESSAGE_STREAM_ID, control);

        Ok(session)
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn codec(&self) -> &dyn MessageCodec {
        self.codec.as_ref()
    }

    pub fn applications(&self) -> &Arc<Applications> {
        &self.applications
    }

    pub(crate) fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    /// Reserves a chunk stream id.  It is released when the returned `ChunkStream` drops.
    pub fn create_chunk_stream(&self) -> Result<ChunkStream, SessionError> {
        let id = lock(&self.registry).allocate_chunk_stream_id()?;
        trace!(connection_id = self.connection_id, csid = id, "Chunk stream created");
        Ok(ChunkStream::new(id, self.weak_self.clone()))
    }

    pub(super) fn release_chunk_stream_id(&self, id: u32) {
        lock(&self.registry).release_chunk_stream_id(id);
    }

    pub fn live_chunk_stream_count(&self) -> usize {
        lock(&self.registry).live_chunk_stream_count()
    }

    /// Creates a message stream with an id no other live stream on this session has
    pub fn create_message_stream(&self) -> Result<Arc<MessageStream>, SessionError> {
        let stream = lock(&self.registry).add_message_stream(MessageStream::new)?;
        debug!(connection_id = self.connection_id, msid = stream.id(), "Message stream created");
        Ok(stream)
    }

    /// Removes the stream, drops its handlers and frees its id
    pub fn remove_message_stream(&self, id: u32) -> Option<Arc<MessageStream>> {
        let stream = lock(&self.registry).remove_message_stream(id)?;
        stream.clear_handlers();
        debug!(connection_id = self.connection_id, msid = id, "Message stream removed");
        Some(stream)
    }

    pub fn message_stream(&self, id: u32) -> Option<Arc<MessageStream>> {
        lock(&self.registry).message_stream(id)
    }

    pub fn message_stream_ids(&self) -> Vec<u32> {
        lock(&self.registry).message_stream_ids()
    }

    /// Encodes `message` and queues its chunks.  The returned future resolves once the last
    /// chunk is on the socket; it does not need to be awaited for the message to go out.
    pub fn send_message(
        &self,
        csid: u32,
        message_stream_id: u32,
        timestamp: RtmpTimestamp,
        message: &RtmpMessage,
    ) -> Result<SendCompletion, SessionError> {
        let (message_type, data) = self.codec.encode(message)?;
        let payload = MessagePayload::new(timestamp, message_type, message_stream_id, data);
        self.outbound.send(csid, &payload)
    }

    /// Sends on the control chunk stream and message stream 0
    pub fn send_control(&self, message: &RtmpMessage) -> Result<SendCompletion, SessionError> {
        self.send_message(
            CONTROL_CHUNK_STREAM_ID,
            CONTROL_MESSAGE_STREAM_ID,
            RtmpTimestamp::new(0),
            message,
        )
    }

    /// Announces `size` to the peer with SetChunkSize and splits every later message at it
    pub fn set_write_chunk_size(&self, size: u32) -> Result<SendCompletion, SessionError> {
        let (message_type, data) = self.codec.encode(&RtmpMessage::SetChunkSize { size })?;
        let announcement = MessagePayload::new(
            RtmpTimestamp::new(0),
            message_type,
            CONTROL_MESSAGE_STREAM_ID,
            data,
        );

        let completion = self.outbound.set_chunk_size(size, &announcement)?;
        debug!(connection_id = self.connection_id, size, "Write chunk size changed");
        Ok(completion)
    }

    pub fn write_chunk_size(&self) -> usize {
        self.outbound.write_chunk_size()
    }

    /// Bytes written to the peer that it has not acknowledged
    pub fn unacknowledged_write_bytes(&self) -> u64 {
        self.outbound.unacknowledged_bytes()
    }

    /// Routes a reassembled message to the handler for its type on its message stream.
    /// Messages for unknown streams and messages that fail to decode are logged and dropped;
    /// message types without a handler are ignored.
    pub fn dispatch(self: &Arc<Self>, payload: MessagePayload) {
        let stream = match self.message_stream(payload.message_stream_id) {
            Some(stream) => stream,
            None => {
                warn!(
                    connection_id = self.connection_id,
                    msid = payload.message_stream_id,
                    message_type = %payload.message_type,
                    "Dropping message for unknown message stream"
                );
                return;
            }
        };

        let handler = match stream.handler(payload.message_type) {
            Some(handler) => handler,
            None => {
                trace!(
                    connection_id = self.connection_id,
                    msid = payload.message_stream_id,
                    message_type = %payload.message_type,
                    "No handler registered for message type"
                );
                return;
            }
        };

        let message = match self.codec.decode(&payload) {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    connection_id = self.connection_id,
                    msid = payload.message_stream_id,
                    message_type = %payload.message_type,
                    %error,
                    "Dropping message that failed to decode"
                );
                return;
            }
        };

        let inbound = InboundMessage {
            timestamp: payload.timestamp,
            message_stream_id: payload.message_stream_id,
            message,
        };

        if let Err(error) = handler.handle(self, inbound) {
            warn!(
                connection_id = self.connection_id,
                msid = payload.message_stream_id,
                %error,
                "Message handler failed"
            );
        }
    }

    /// Opens a NetStream: a new message stream with its own chunk stream
    pub fn create_net_stream(self: &Arc<Self>) -> Result<Arc<NetStream>, SessionError> {
        let stream = NetStream::open(self)?;
        lock(&self.net_streams).insert(stream.id(), stream.clone());
        Ok(stream)
    }

    /// Closes the NetStream and releases its ids.  Returns false if no such stream is open.
    pub fn delete_net_stream(&self, id: u32) -> bool {
        let removed = lock(&self.net_streams).remove(&id);
        match removed {
            Some(stream) => {
                self.remove_message_stream(id);
                drop(stream);
                true
            }

            None => false,
        }
    }

    pub fn net_stream(&self, id: u32) -> Option<Arc<NetStream>> {
        lock(&self.net_streams).get(&id).cloned()
    }

    pub fn connection_information(&self) -> Option<ConnectionInformation> {
        lock(&self.connection)
            .as_ref()
            .map(|connected| connected.information.clone())
    }

    /// RPC entry point of the connected app, once `connect` succeeded
    pub fn rpc_service(&self) -> Option<RpcService> {
        lock(&self.connection)
            .as_ref()
            .map(|connected| connected.rpc.clone())
    }

    /// Records a successful `connect`.  Returns false if the session was already connected.
    pub(super) fn set_connection(&self, information: ConnectionInformation, rpc: RpcService) -> bool {
        let mut connection = lock(&self.connection);
        if connection.is_some() {
            return false;
        }

        *connection = Some(ConnectedApp { information, rpc });
        true
    }

    /// Asks the connection pipeline to stop
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!(connection_id = self.connection_id, "Closing session");
        }

        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drops every stream and handler.  Called by the pipeline once its loops have stopped.
    pub fn shutdown(&self) {
        self.close();

        let net_streams: Vec<Arc<NetStream>> = lock(&self.net_streams)
            .drain()
            .map(|(_, stream)| stream)
            .collect();
        let message_streams = lock(&self.registry).drain_message_streams();

        for stream in &message_streams {
            stream.clear_handlers();
        }

        lock(&self.connection).take();
        drop(net_streams);
        drop(message_streams);
    }
}
