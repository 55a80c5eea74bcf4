//! Helpers shared by the unit tests: a session without a socket, a client side reassembler for
//! whatever the server queued, and a scripted client speaking over an in-memory duplex.

use crate::chunk_io::{ChunkDeserializer, ChunkSerializer};
use crate::handshake::{C0_C1_SIZE, PACKET_SIZE};
use crate::io::{OutboundChunk, OutboundQueue, ParseState, StepResult};
use crate::messages::{CommandMessage, MessageCodec, MessagePayload, RtmpMessage, StandardCodec};
use crate::sessions::{
    Applications, InboundMessage, RpcContext, RpcError, RtmpController, RtmpSession, ServerConfig,
};
use crate::time::RtmpTimestamp;
use bytes::{Buf, BytesMut};
use rtmp_amf0::Amf0Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn detached_session() -> (Arc<RtmpSession>, mpsc::UnboundedReceiver<OutboundChunk>) {
    session_with(Applications::new())
}

pub fn session_with(
    applications: Applications,
) -> (Arc<RtmpSession>, mpsc::UnboundedReceiver<OutboundChunk>) {
    let (outbound, receiver) = OutboundQueue::new();
    let session = RtmpSession::new(
        1,
        ServerConfig::new(),
        Arc::new(StandardCodec),
        Arc::new(applications),
        Arc::new(outbound),
        CancellationToken::new(),
    )
    .unwrap();

    (session, receiver)
}

/// Encodes `message` into what the framer would hand the session
pub fn payload(message_stream_id: u32, timestamp: u32, message: &RtmpMessage) -> MessagePayload {
    let (message_type, data) = StandardCodec.encode(message).unwrap();
    MessagePayload::new(RtmpTimestamp::new(timestamp), message_type, message_stream_id, data)
}

pub fn connect_command(app: &str, transaction_id: f64) -> RtmpMessage {
    let mut properties = HashMap::new();
    properties.insert("app".to_string(), Amf0Value::from(app));
    properties.insert("tcUrl".to_string(), Amf0Value::from(format!("rtmp://localhost/{}", app)));
    properties.insert("objectEncoding".to_string(), Amf0Value::Number(0.0));

    RtmpMessage::Command(CommandMessage::new(
        "connect",
        transaction_id,
        Amf0Value::Object(properties),
    ))
}

pub fn command(name: &str, transaction_id: f64, arguments: Vec<Amf0Value>) -> RtmpMessage {
    let mut command = CommandMessage::new(name, transaction_id, Amf0Value::Null);
    command.arguments = arguments;
    RtmpMessage::Command(command)
}

/// `(procedure name, first argument's code property)` of a command reply
pub fn reply_summary(message: &InboundMessage) -> Option<(String, Option<String>)> {
    match &message.message {
        RtmpMessage::Command(command) => {
            let code = command
                .arguments
                .first()
                .and_then(|value| value.property("code"))
                .and_then(Amf0Value::as_str)
                .map(str::to_string);

            Some((command.procedure_name.clone(), code))
        }

        _ => None,
    }
}

/// Reassembles chunks the way a client would, following SetChunkSize announcements
pub struct PeerReader {
    framer: ChunkDeserializer,
    state: ParseState,
    buffer: BytesMut,
}

impl PeerReader {
    pub fn new() -> PeerReader {
        PeerReader {
            framer: ChunkDeserializer::new(),
            state: ParseState::FirstByteBasicHeader,
            buffer: BytesMut::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<InboundMessage> {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        loop {
            match self.framer.step(self.state, &self.buffer).unwrap() {
                StepResult::NeedMoreData => break,
                StepResult::Advanced { consumed, next } => {
                    self.buffer.advance(consumed);
                    self.state = next;
                }

                StepResult::MessageCompleted { consumed, message } => {
                    self.buffer.advance(consumed);
                    self.state = ParseState::FirstByteBasicHeader;

                    let decoded = StandardCodec.decode(&message).unwrap();
                    if let RtmpMessage::SetChunkSize { size } = decoded {
                        self.framer.set_max_chunk_size(size as usize).unwrap();
                    }

                    messages.push(InboundMessage {
                        timestamp: message.timestamp,
                        message_stream_id: message.message_stream_id,
                        message: decoded,
                    });
                }
            }
        }

        messages
    }

    /// Everything queued so far, skipping the writer
    pub fn drain(&mut self, receiver: &mut mpsc::UnboundedReceiver<OutboundChunk>) -> Vec<InboundMessage> {
        let mut messages = Vec::new();
        while let Ok(chunk) = receiver.try_recv() {
            messages.extend(self.feed(&chunk.bytes));
        }

        messages
    }
}

/// What a `RecordingController` saw
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Invoked {
        procedure: String,
        message_stream_id: u32,
    },
    StreamMessage(InboundMessage),
}

/// Replies `"ok"` to every procedure except `fail`, and reports everything it sees
pub struct RecordingController {
    events: mpsc::UnboundedSender<ControllerEvent>,
}

impl RecordingController {
    pub fn new() -> (Arc<RecordingController>, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Arc::new(RecordingController { events }), receiver)
    }
}

impl RtmpController for RecordingController {
    fn invoke(
        &self,
        context: &RpcContext<'_>,
        command: &CommandMessage,
    ) -> Result<Option<Amf0Value>, RpcError> {
        let _ = self.events.send(ControllerEvent::Invoked {
            procedure: command.procedure_name.clone(),
            message_stream_id: context.message_stream_id,
        });

        match command.procedure_name.as_str() {
            "fail" => Err(RpcError::Failed {
                code: "Test.Failed".to_string(),
                description: "asked to fail".to_string(),
            }),

            "panic" => panic!("controller panicked"),
            _ => Ok(Some(Amf0Value::from("ok"))),
        }
    }

    fn on_stream_message(&self, _context: &RpcContext<'_>, message: &InboundMessage) {
        let _ = self.events.send(ControllerEvent::StreamMessage(message.clone()));
    }
}

pub fn applications_with(app: &str, controller: Arc<dyn RtmpController>) -> Applications {
    let applications = Applications::new();
    applications.register(app, controller);
    applications
}

/// The client end of an in-memory connection
pub struct TestClient {
    stream: DuplexStream,
    serializer: ChunkSerializer,
    reader: PeerReader,
    pending: VecDeque<InboundMessage>,
}

impl TestClient {
    pub fn new(stream: DuplexStream) -> TestClient {
        TestClient {
            stream,
            serializer: ChunkSerializer::new(),
            reader: PeerReader::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn c1_random() -> Vec<u8> {
        (0..PACKET_SIZE - 8).map(|x| (x % 251) as u8).collect()
    }

    pub async fn write(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Sends C0+C1 and returns S0+S1 and S2 as one buffer
    pub async fn send_c0_c1(&mut self, version: u8) -> Vec<u8> {
        let mut c0_c1 = vec![version, 0, 0, 0, 0, 0, 0, 0, 0];
        c0_c1.extend(TestClient::c1_random());
        assert_eq!(c0_c1.len(), C0_C1_SIZE);
        self.write(&c0_c1).await;

        let mut response = vec![0; 1 + PACKET_SIZE * 2];
        tokio::time::timeout(TEST_TIMEOUT, self.stream.read_exact(&mut response))
            .await
            .unwrap()
            .unwrap();

        response
    }

    pub async fn handshake(&mut self) -> Vec<u8> {
        let response = self.send_c0_c1(3).await;
        let s1 = &response[1..1 + PACKET_SIZE];
        let mut c2 = s1[0..4].to_vec();
        c2.extend_from_slice(&[0, 0, 0, 0]);
        c2.extend_from_slice(&s1[8..]);
        self.write(&c2).await;

        response
    }

    pub async fn send(&mut self, csid: u32, message_stream_id: u32, message: &RtmpMessage) {
        let payload = payload(message_stream_id, 0, message);
        let chunks = self.serializer.serialize(csid, &payload).unwrap();
        let bytes: Vec<u8> = chunks.iter().flat_map(|chunk| chunk.iter().copied()).collect();
        self.write(&bytes).await;
    }

    /// Announces and switches to a new chunk size for everything sent afterwards
    pub async fn set_chunk_size(&mut self, size: u32) {
        self.send(2, 0, &RtmpMessage::SetChunkSize { size }).await;
        self.serializer.set_max_chunk_size(size).unwrap();
    }

    pub async fn next_message(&mut self) -> InboundMessage {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return message;
            }

            let mut buffer = vec![0; 8192];
            let read = tokio::time::timeout(TEST_TIMEOUT, self.stream.read(&mut buffer))
                .await
                .unwrap()
                .unwrap();

            assert!(read > 0, "server closed the connection");
            let messages = self.reader.feed(&buffer[..read]);
            self.pending.extend(messages);
        }
    }

    /// Waits for the server to close its end, discarding anything it sends first
    pub async fn expect_closed(&mut self) {
        let mut buffer = vec![0; 8192];
        loop {
            let read = tokio::time::timeout(TEST_TIMEOUT, self.stream.read(&mut buffer))
                .await
                .unwrap()
                .unwrap();

            if read == 0 {
                return;
            }
        }
    }

    /// Runs `connect` for `app` and consumes the four replies
    pub async fn connect(&mut self, app: &str) -> InboundMessage {
        self.send(3, 0, &connect_command(app, 1.0)).await;
        for _ in 0..3 {
            self.next_message().await;
        }

        self.next_message().await
    }
}
