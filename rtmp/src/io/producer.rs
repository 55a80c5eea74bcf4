use super::budget::ReadBudget;
use super::ConnectionError;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Reads from the socket into buffers sized by `budget` and hands each filled buffer to the
/// consumer.  The bounded channel is what pushes back on the peer when the consumer falls
/// behind.
pub async fn run<R>(
    mut reader: R,
    sender: mpsc::Sender<Bytes>,
    budget: Arc<ReadBudget>,
    cancel: CancellationToken,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::new();
    loop {
        let size = budget.next_read_size();
        buffer.resize(size, 0);

        let bytes_read = tokio::select! {
            _ = cancel.cancelled() => break,
            result = reader.read(&mut buffer[..]) => result?,
        };

        if bytes_read == 0 {
            debug!("Peer closed the connection");
            cancel.cancel();
            break;
        }

        trace!(bytes_read, requested = size, "Read from socket");
        buffer.truncate(bytes_read);
        let filled = buffer.split().freeze();

        tokio::select! {
            _ = cancel.cancelled() => break,
            result = sender.send(filled) => {
                if result.is_err() {
                    break;
                }
            }
        }
    }

    Ok(())
}
