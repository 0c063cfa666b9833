//! # Registry Types
//!
//! The records the dispatcher's single coarse lock actually guards:
//! registered workers, in-flight requests keyed by `packetId`, and the FIFO
//! overflow queue.

use crate::model::SlaveStatistics;
use crate::transport::Connection;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// One registered worker. Insertion order into the dispatcher's `workers`
/// vector is "Slave #N" display numbering and the iteration order every
/// selection policy walks.
pub struct WorkerRecord {
    pub id: u64,
    pub addr: SocketAddr,
    pub connection: Arc<Connection>,
    pub registered_at: Instant,
    pub stats: SlaveStatistics,
    pub busy: bool,
}

/// A job in flight between the master and a worker, keyed by `packetId`.
/// Created when an `ImageRequest` is accepted from a submitter; consumed
/// when the matching `ImageResponse` arrives. If no response ever arrives
/// (worker disconnects mid-job, or the dispatch send itself failed) the
/// entry simply stays — no sweep is specified.
pub struct PendingRequest {
    pub submitter: Arc<Connection>,
    pub submitter_addr: SocketAddr,
    pub file_name: String,
    /// Set once the job is actually handed to a worker; `None` while it
    /// still sits in the FIFO queue.
    pub dispatched_at: Option<Instant>,
}

/// A queued job waiting for a free worker: the original request payload,
/// preserved unmodified, plus the `packetId` it's keyed under.
pub struct PendingTask {
    pub packet_id: String,
    pub packet: crate::model::ImagePacket,
}

static NEXT_WORKER_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

pub fn next_worker_id() -> u64 {
    NEXT_WORKER_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}
