use rtmp_mux::io::{serve_connection, ConnectionOptions};
use rtmp_mux::sessions::{Applications, ServerConfig};
use std::fmt::Display;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Where inbound connections come from
pub trait Incoming {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    /// Socket options applied before the connection is served
    fn prepare(&self, stream: &Self::Stream) -> io::Result<()>;
}

impl Incoming for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn prepare(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)
    }
}

/// Serves every accepted connection on its own task until `shutdown` is cancelled.  Failing
/// to accept or prepare one connection never stops the loop.
pub async fn accept_connections<I: Incoming>(
    mut incoming: I,
    config: ServerConfig,
    applications: Arc<Applications>,
    shutdown: CancellationToken,
) {
    let mut current_id = 0;
    loop {
        let accepted = tokio::select! {
            accepted = incoming.accept() => accepted,
            _ = shutdown.cancelled() => return,
        };

        let (stream, address) = match accepted {
            Ok(accepted) => accepted,
            Err(error) => {
                // Back off so descriptor exhaustion does not spin the loop
                error!(%error, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };

        let connection_id = current_id;
        current_id += 1;

        info!(connection_id, peer = %address, "Connection received");
        if let Err(error) = incoming.prepare(&stream) {
            warn!(connection_id, %error, "Dropping connection that could not be prepared");
            continue;
        }

        let options = ConnectionOptions::new(connection_id, config.clone(), applications.clone());
        spawn(connection_id, serve_connection(stream, options, shutdown.clone()));
    }
}

fn spawn<F, E>(connection_id: u64, future: F)
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display,
{
    tokio::task::spawn(async move {
        if let Err(error) = future.await {
            error!(connection_id, %error, "Connection failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};

    const TIMEOUT: Duration = Duration::from_secs(5);

    enum Scripted {
        Fail(io::ErrorKind),
        Connect { stream: DuplexStream, preparable: bool },
    }

    /// Hands out scripted results, then waits forever
    struct ScriptedIncoming {
        script: VecDeque<Scripted>,
        unpreparable: Vec<usize>,
        accepted: usize,
    }

    impl ScriptedIncoming {
        fn new(script: Vec<Scripted>) -> ScriptedIncoming {
            ScriptedIncoming {
                script: script.into(),
                unpreparable: Vec::new(),
                accepted: 0,
            }
        }
    }

    struct TaggedStream {
        index: usize,
        inner: DuplexStream,
    }

    impl AsyncRead for TaggedStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for TaggedStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    impl Incoming for ScriptedIncoming {
        type Stream = TaggedStream;

        fn accept(&mut self) -> impl Future<Output = io::Result<(TaggedStream, SocketAddr)>> + Send {
            let index = self.accepted;
            self.accepted += 1;

            let result = match self.script.pop_front() {
                Some(Scripted::Fail(kind)) => Some(Err(io::Error::from(kind))),
                Some(Scripted::Connect { stream, preparable }) => {
                    if !preparable {
                        self.unpreparable.push(index);
                    }

                    let address = SocketAddr::from(([127, 0, 0, 1], 40000 + index as u16));
                    Some(Ok((TaggedStream { index, inner: stream }, address)))
                }
                None => None,
            };

            async move {
                match result {
                    Some(result) => result,
                    None => std::future::pending().await,
                }
            }
        }

        fn prepare(&self, stream: &TaggedStream) -> io::Result<()> {
            if self.unpreparable.contains(&stream.index) {
                return Err(io::Error::from(io::ErrorKind::NotConnected));
            }

            Ok(())
        }
    }

    /// Sends C0 and C1 and returns the version byte the server answers with
    async fn server_version(peer: &mut DuplexStream) -> u8 {
        let mut c0_c1 = vec![3_u8];
        c0_c1.extend(vec![0_u8; 1536]);
        peer.write_all(&c0_c1).await.unwrap();

        let mut s0 = [0_u8; 1];
        tokio::time::timeout(TIMEOUT, peer.read_exact(&mut s0))
            .await
            .unwrap()
            .unwrap();
        s0[0]
    }

    #[tokio::test]
    async fn accept_and_prepare_failures_do_not_stop_the_listener() {
        let (dropped, mut dropped_peer) = tokio::io::duplex(8 * 1024);
        let (served, mut served_peer) = tokio::io::duplex(8 * 1024);

        let incoming = ScriptedIncoming::new(vec![
            Scripted::Fail(io::ErrorKind::ConnectionAborted),
            Scripted::Connect {
                stream: dropped,
                preparable: false,
            },
            Scripted::Connect {
                stream: served,
                preparable: true,
            },
        ]);

        let shutdown = CancellationToken::new();
        let listener = tokio::spawn(accept_connections(
            incoming,
            ServerConfig::new(),
            Arc::new(Applications::new()),
            shutdown.clone(),
        ));

        assert_eq!(server_version(&mut served_peer).await, 3);

        // The unprepared stream is dropped without being served
        let mut buffer = [0_u8; 1];
        let read = tokio::time::timeout(TIMEOUT, dropped_peer.read(&mut buffer))
            .await
            .unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));

        shutdown.cancel();
        tokio::time::timeout(TIMEOUT, listener).await.unwrap().unwrap();
    }
}
