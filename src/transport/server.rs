//! # Accept Loop
//!
//! Binds one TCP port and spawns a reader task (via
//! [`crate::transport::connection::accept_connection`]) per accepted
//! connection. Every frame from every connection lands on the same shared
//! channel, tagged with the connection it arrived on; the master's
//! dispatcher owns the receiving end and never registers per-connection
//! callbacks — it just consumes the channel in its own loop.

use crate::transport::connection::{accept_connection, Inbound};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop until `shutdown` is signaled. Every accepted
    /// connection gets its own reader task, handed a clone of the same
    /// `shutdown` receiver; frames are published on `tx`. New accepts stop
    /// at the next suspension point after cancellation — in-flight reader
    /// tasks are not forcibly joined here, they observe cancellation
    /// independently at their next read via their own `select!`.
    pub async fn serve(self, tx: mpsc::Sender<Inbound>, mut shutdown: watch::Receiver<bool>) {
        info!(addr = %self.listener.local_addr().ok().map(|a| a.to_string()).unwrap_or_default(), "accept loop listening");
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if let Err(e) = accept_connection(stream, tx.clone(), shutdown.clone()) {
                                error!(peer = %peer, error = %e, "failed to configure accepted connection");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "accept failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("accept loop received shutdown signal");
                    break;
                }
            }
        }
    }
}
