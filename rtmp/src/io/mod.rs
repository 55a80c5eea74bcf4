/*!
Per connection I/O scheduling.

Every connection runs three loops:

* the **producer** reads from the socket into buffers sized for the current chunk size and
  passes them over a bounded channel,
* the **consumer** runs the handshake and then the chunk framer over those bytes, applies
  protocol control messages and hands everything else to the session,
* the **writer** is the only task that writes to the socket, draining the outbound queue in
  order and resolving each message's completion once its last chunk is flushed.

A cancellation token ties them together: whichever loop stops first, for any reason, stops
the other two.
*/

mod budget;
mod consumer;
mod errors;
mod outbound;
mod producer;
mod state;
mod window;
mod writer;


pub use self::budget::ReadBudget;
pub use self::consumer::Consumer;
pub use self::errors::ConnectionError;
pub use self::outbound::{OutboundChunk, OutboundQueue, SendCompletion};
pub use self::state::{ParseState, StepResult};
pub use self::window::WindowState;

use crate::chunk_io::INITIAL_CHUNK_SIZE;
use crate::messages::{MessageCodec, StandardCodec};
use crate::sessions::{Applications, ControlProtocol, RtmpSession, ServerConfig};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything a connection pipeline needs besides its socket
#[derive(Clone)]
pub struct ConnectionOptions {
    pub connection_id: u64,
    pub config: ServerConfig,
    pub applications: Arc<Applications>,
    pub codec: Arc<dyn MessageCodec>,
}

impl ConnectionOptions {
    /// Options using the standard codec
    pub fn new(connection_id: u64, config: ServerConfig, applications: Arc<Applications>) -> Self {
        ConnectionOptions {
            connection_id,
            config,
            applications,
            codec: Arc::new(StandardCodec),
        }
    }
}

/// Serves one RTMP connection until the peer disconnects, a protocol violation occurs, the
/// session closes itself or `cancel` fires.  Returns the first error any loop hit.
pub async fn serve_connection<S>(
    socket: S,
    options: ConnectionOptions,
    cancel: CancellationToken,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite,
{
    let cancel = cancel.child_token();
    let connection_id = options.connection_id;
    let (outbound, outbound_receiver) = OutboundQueue::new();
    let outbound = Arc::new(outbound);
    let write_counter = outbound.write_counter();

    let budget = Arc::new(ReadBudget::new(
        options.config.handshake_read_size,
        INITIAL_CHUNK_SIZE,
    ));

    let (inbound_sender, inbound_receiver) = mpsc::channel(options.config.inbound_queue_depth.max(1));

    let session = RtmpSession::new(
        connection_id,
        options.config,
        options.codec,
        options.applications,
        outbound,
        cancel.clone(),
    )?;

    let consumer = Consumer::new(
        session.clone(),
        ControlProtocol::new(write_counter.clone()),
        budget.clone(),
    );

    let (reader, writer) = tokio::io::split(socket);
    debug!(connection_id, "Connection pipeline starting");

    let (produced, consumed, written) = tokio::join!(
        cancel_on_exit(
            producer::run(reader, inbound_sender, budget, cancel.clone()),
            &cancel
        ),
        cancel_on_exit(consumer.run(inbound_receiver, cancel.clone()), &cancel),
        cancel_on_exit(
            writer::run(writer, outbound_receiver, write_counter, cancel.clone()),
            &cancel
        ),
    );

    session.shutdown();
    info!(connection_id, "Connection closed");

    produced.and(consumed).and(written)
}

async fn cancel_on_exit<F>(future: F, cancel: &CancellationToken) -> Result<(), ConnectionError>
where
    F: Future<Output = Result<(), ConnectionError>>,
{
    let result = future.await;
    cancel.cancel();
    result
}
