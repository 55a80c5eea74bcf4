use super::outbound::OutboundChunk;
use super::ConnectionError;
use futures::FutureExt;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// The only task that writes to the socket.  Chunks go out in the order they were queued and a
/// chunk's completion fires only after its bytes were flushed.
pub async fn run<W>(
    mut writer: W,
    mut receiver: mpsc::UnboundedReceiver<OutboundChunk>,
    written: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    let mut pending = VecDeque::new();
    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = receiver.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        pending.push_back(first);
        while let Some(Some(chunk)) = receiver.recv().now_or_never() {
            pending.push_back(chunk);
        }

        let mut completions = Vec::new();
        let flushed = tokio::select! {
            // The peer may have stopped reading
            _ = cancel.cancelled() => {
                debug!(queued = pending.len(), "Writer cancelled during a write");
                return Ok(());
            }
            flushed = write_batch(&mut writer, &mut pending, &mut completions) => flushed?,
        };

        written.fetch_add(flushed as u64, Ordering::AcqRel);
        trace!(bytes = flushed, "Flushed outbound chunks");

        for completion in completions {
            // The sender may have stopped waiting, which is fine
            let _ = completion.send(());
        }
    }

    debug!("Writer stopping");
    let _ = writer.shutdown().await;
    Ok(())
}

/// Writes and flushes every pending chunk, collecting completions to fire once flushed
async fn write_batch<W>(
    writer: &mut W,
    pending: &mut VecDeque<OutboundChunk>,
    completions: &mut Vec<oneshot::Sender<()>>,
) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut total = 0;
    while let Some(chunk) = pending.pop_front() {
        writer.write_all(&chunk.bytes).await?;
        total += chunk.bytes.len();
        if let Some(completion) = chunk.completion {
            completions.push(completion);
        }
    }

    writer.flush().await?;
    Ok(total)
}
