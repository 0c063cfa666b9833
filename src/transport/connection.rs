//! # Connection Handles
//!
//! A `Connection` wraps the write half of a TCP stream behind a mutex so
//! multiple call sites can `send` concurrently, and pairs it with a reader
//! task that pushes every inbound frame into a shared channel alongside the
//! connection handle it arrived on — "publish the message with the
//! connection handle attached" from the transport spec.
//!
//! The same pair (`Connection` + reader task) services both accepted
//! connections (master's side) and connections this process dialed out
//! itself (worker/submitter side), which is what makes a single socket
//! carry outbound requests and inbound responses symmetrically.

use crate::error::TransportError;
use crate::transport::frame::{read_frame, write_frame};
use crate::transport::NetworkMessage;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// One frame as delivered to a dispatcher: the message, tagged with the
/// connection it arrived on so a reply can be routed back to the same peer.
pub type Inbound = (Arc<Connection>, NetworkMessage);

/// A live, sendable handle to one peer connection.
pub struct Connection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Serialize and send `message`, length-prefixed, over this connection.
    /// Returning `Ok(())` only guarantees the bytes left the local buffer.
    pub async fn send(&self, message: &NetworkMessage) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, message).await
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// Frames carrying image bytes can be large (up to [`crate::transport::MAX_FRAME_BYTES`]);
/// size the socket's OS buffers generously so a single frame doesn't need
/// many round trips through the kernel to move.
const SOCKET_BUFFER_BYTES: usize = 256 * 1024;

/// Configure a freshly accepted or connected socket for low-latency framed
/// messaging, splitting it into owned halves.
fn split_tuned(stream: TcpStream) -> std::io::Result<(OwnedReadHalf, OwnedWriteHalf, SocketAddr)> {
    let remote_addr = stream.peer_addr()?;
    let std_stream = stream.into_std()?;
    let socket = socket2::Socket::from(std_stream);
    socket.set_nodelay(true)?;
    socket.set_recv_buffer_size(SOCKET_BUFFER_BYTES)?;
    socket.set_send_buffer_size(SOCKET_BUFFER_BYTES)?;
    let std_stream: std::net::TcpStream = socket.into();
    std_stream.set_nonblocking(true)?;
    let stream = TcpStream::from_std(std_stream)?;
    let (read_half, write_half) = stream.into_split();
    Ok((read_half, write_half, remote_addr))
}

/// Spawn the reader loop for one connection: read frames until the peer
/// disconnects, misbehaves, or `shutdown` fires, overwrite the sender fields
/// from the observed remote endpoint (the wire's own `SenderIp`/`SenderPort`
/// are untrusted), and forward `(connection, message)` pairs to `tx`.
///
/// The single cancellation signal is observed at the reader's next
/// suspension point (the `select!` below), per §4.1/§5's requirement that it
/// "stops new accepts and all per-connection readers." A read error that
/// isn't a clean disconnect is logged and surfaced once before the reader
/// exits; the connection is never treated as fatal to the rest of the
/// server.
fn spawn_reader(
    mut read_half: OwnedReadHalf,
    connection: Arc<Connection>,
    tx: mpsc::Sender<Inbound>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let id = connection.id();
        loop {
            tokio::select! {
                result = read_frame(&mut read_half) => {
                    match result {
                        Ok(mut message) => {
                            message.sender_ip = connection.remote_addr().ip();
                            message.sender_port = connection.remote_addr().port();
                            if tx.send((connection.clone(), message)).await.is_err() {
                                debug!(connection = id, "dispatcher channel closed, ending reader");
                                break;
                            }
                        }
                        Err(TransportError::Disconnected) => {
                            debug!(connection = id, "peer disconnected");
                            break;
                        }
                        Err(e) => {
                            warn!(connection = id, error = %e, "connection reader error, abandoning connection");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!(connection = id, "reader task received shutdown signal");
                    break;
                }
            }
        }
        connection.close().await;
    });
}

/// Build a `Connection` from an already-accepted or already-connected
/// socket and start its reader task.
fn spawn_connection(
    stream: TcpStream,
    tx: mpsc::Sender<Inbound>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<Arc<Connection>> {
    let (read_half, write_half, remote_addr) = split_tuned(stream)?;
    let connection = Arc::new(Connection {
        id: next_connection_id(),
        remote_addr,
        writer: Mutex::new(write_half),
    });
    spawn_reader(read_half, connection.clone(), tx, shutdown);
    Ok(connection)
}

/// Dial out to `addr`, returning a sendable connection handle plus the
/// channel its reader task publishes inbound frames on. Used by both the
/// worker (dialing the master) and the submitter (dialing the master).
/// `shutdown` is the same single cancellation signal the caller's own loop
/// observes, so the dialed connection's reader stops at its next suspension
/// point right alongside it.
pub async fn connect(
    addr: SocketAddr,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<(Arc<Connection>, mpsc::Receiver<Inbound>)> {
    let stream = TcpStream::connect(addr).await?;
    let (tx, rx) = mpsc::channel(1024);
    let connection = spawn_connection(stream, tx, shutdown)?;
    Ok((connection, rx))
}

pub(crate) fn accept_connection(
    stream: TcpStream,
    tx: mpsc::Sender<Inbound>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<Arc<Connection>> {
    spawn_connection(stream, tx, shutdown)
}
