use crate::chunk_io::{ChunkSerializer, CONTROL_CHUNK_STREAM_ID};
use crate::lock;
use crate::messages::MessagePayload;
use crate::sessions::SessionError;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// One write for the writer loop.  Only the last chunk of a message carries a completion.
#[derive(Debug)]
pub struct OutboundChunk {
    pub bytes: Bytes,
    pub completion: Option<oneshot::Sender<()>>,
}

/// Resolves once the writer has put the final chunk of a message on the socket.  Dropping it
/// does not cancel the send.
#[derive(Debug)]
pub struct SendCompletion {
    receiver: oneshot::Receiver<()>,
}

impl Future for SendCompletion {
    type Output = Result<(), SessionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| SessionError::SessionClosed))
    }
}

/// Front of the connection's single writer.
///
/// The chunk serializer lives behind a mutex and every chunk of a message is queued while
/// holding it, so chunks of one message are never interleaved with another message on the same
/// chunk stream, and chunk size changes line up with the SetChunkSize that announces them.
pub struct OutboundQueue {
    serializer: Mutex<ChunkSerializer>,
    sender: mpsc::UnboundedSender<OutboundChunk>,
    unacknowledged: Arc<AtomicU64>,
}

impl OutboundQueue {
    pub fn new() -> (OutboundQueue, mpsc::UnboundedReceiver<OutboundChunk>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = OutboundQueue {
            serializer: Mutex::new(ChunkSerializer::new()),
            sender,
            unacknowledged: Arc::new(AtomicU64::new(0)),
        };

        (queue, receiver)
    }

    /// Queues bytes that are not chunked, such as handshake packets
    pub fn send_raw(&self, bytes: Bytes) -> Result<(), SessionError> {
        self.enqueue(bytes, None)
    }

    /// Splits `message` into chunks on `csid` and queues all of them before returning
    pub fn send(&self, csid: u32, message: &MessagePayload) -> Result<SendCompletion, SessionError> {
        let mut serializer = lock(&self.serializer);
        let chunks = serializer.serialize(csid, message)?;
        self.enqueue_chunks(chunks)
    }

    /// Queues `announcement` (a SetChunkSize message) at the current size, then switches the
    /// serializer to `size` for everything queued after it
    pub fn set_chunk_size(
        &self,
        size: u32,
        announcement: &MessagePayload,
    ) -> Result<SendCompletion, SessionError> {
        let mut serializer = lock(&self.serializer);
        let chunks = serializer.serialize(CONTROL_CHUNK_STREAM_ID, announcement)?;
        serializer.set_max_chunk_size(size)?;
        self.enqueue_chunks(chunks)
    }

    pub fn write_chunk_size(&self) -> usize {
        lock(&self.serializer).max_chunk_size()
    }

    /// Bytes written to the socket that the peer has not acknowledged yet
    pub fn unacknowledged_bytes(&self) -> u64 {
        self.unacknowledged.load(Ordering::Acquire)
    }

    pub(crate) fn write_counter(&self) -> Arc<AtomicU64> {
        self.unacknowledged.clone()
    }

    fn enqueue_chunks(&self, chunks: Vec<Bytes>) -> Result<SendCompletion, SessionError> {
        let (completion, receiver) = oneshot::channel();
        let last = chunks.len().saturating_sub(1);
        let mut completion = Some(completion);
        for (index, bytes) in chunks.into_iter().enumerate() {
            let signal = if index == last { completion.take() } else { None };
            self.enqueue(bytes, signal)?;
        }

        Ok(SendCompletion { receiver })
    }

    fn enqueue(
        &self,
        bytes: Bytes,
        completion: Option<oneshot::Sender<()>>,
    ) -> Result<(), SessionError> {
        self.sender
            .send(OutboundChunk { bytes, completion })
            .map_err(|_| SessionError::SessionClosed)
    }
}
