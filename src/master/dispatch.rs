//! # Dispatcher
//!
//! The master's event loop owns no callbacks: it drains a channel of
//! `(Connection, NetworkMessage)` pairs published by the transport layer and
//! routes each to one of the operations below. Every operation that touches
//! the worker list, busy flags, pending-request map, queue, or round-robin
//! counter takes the same `std::sync::Mutex` so that `selectWorker` and
//! marking a worker busy stay atomic — the lock is never held across an
//! `.await`, so a send always happens after the guard is dropped.

use crate::master::policy::SelectionPolicy;
use crate::master::registry::{next_worker_id, PendingRequest, PendingTask, WorkerRecord};
use crate::master::stats::FinalStatisticsSummary;
use crate::model::{ImagePacket, SlaveRegistrationData, SlaveStatistics};
use crate::transport::{Connection, Inbound, MessageKind, NetworkMessage};
use anyhow::{Context, Result};
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct State {
    workers: Vec<WorkerRecord>,
    worker_index: HashMap<(IpAddr, u16), usize>,
    pending: HashMap<String, PendingRequest>,
    queue: VecDeque<PendingTask>,
    received: u64,
    completed: u64,
    first_event: Option<Instant>,
    last_event: Option<Instant>,
    policy: Box<dyn SelectionPolicy>,
}

/// Attempt `selectWorker` + mark-busy as one atomic step. Returns the index
/// of the worker now marked busy, or `None` if every worker is busy (or
/// there are none).
fn select_and_mark_busy(state: &mut State) -> Option<usize> {
    let idx = state.policy.select(&state.workers)?;
    state.workers[idx].busy = true;
    Some(idx)
}

pub struct Dispatcher {
    state: Mutex<State>,
}

impl Dispatcher {
    pub fn new(policy: Box<dyn SelectionPolicy>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                workers: Vec::new(),
                worker_index: HashMap::new(),
                pending: HashMap::new(),
                queue: VecDeque::new(),
                received: 0,
                completed: 0,
                first_event: None,
                last_event: None,
                policy,
            }),
        })
    }

    /// Drain `rx` forever, dispatching every inbound frame by its kind. Runs
    /// as the master's single event-dispatch task; never returns unless the
    /// channel closes (transport shutdown).
    ///
    /// Frames are handled inline, one at a time, in the order they arrive on
    /// this channel — NOT spawned off onto their own tasks. The dispatcher
    /// "owns its loop" rather than registering callbacks (§9), and per
    /// §5/§8, frames from one connection must be processed in send order;
    /// spawning a task per message would let two back-to-back frames from
    /// the same submitter race on `select_and_mark_busy` and the pending
    /// queue across threads on the multi-threaded runtime `id-master` runs
    /// on. The `std::sync::Mutex` in `State` is never held across an
    /// `.await`, so inline sequential handling costs no throughput that
    /// spawning would have bought.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Inbound>) {
        while let Some((conn, msg)) = rx.recv().await {
            if let Err(e) = self.handle(conn, msg).await {
                warn!(error = %e, "failed to handle inbound message");
            }
        }
        info!("dispatcher channel closed, event loop exiting");
    }

    async fn handle(self: &Arc<Self>, conn: Arc<Connection>, msg: NetworkMessage) -> Result<()> {
        match msg.kind {
            MessageKind::SlaveRegister => self.register_worker(msg, conn).await,
            MessageKind::ImageRequest => self.accept_job(msg, conn).await,
            MessageKind::ImageResponse => self.handle_result(msg).await,
            MessageKind::SlaveStatistics => self.handle_stats(msg),
            MessageKind::Acknowledgment => {
                debug!("master received an acknowledgment, nothing to do");
                Ok(())
            }
        }
    }

    pub async fn register_worker(self: &Arc<Self>, msg: NetworkMessage, conn: Arc<Connection>) -> Result<()> {
        let reg: SlaveRegistrationData = msg
            .json_body()
            .context("failed to decode SlaveRegistrationData")?;
        let key = (reg.ip_address, reg.port);

        let newly_registered = {
            let mut state = self.state.lock().unwrap();
            if state.worker_index.contains_key(&key) {
                false
            } else {
                let idx = state.workers.len();
                state.workers.push(WorkerRecord {
                    id: next_worker_id(),
                    addr: SocketAddr::new(reg.ip_address, reg.port),
                    connection: conn.clone(),
                    registered_at: Instant::now(),
                    stats: SlaveStatistics::zero(reg.port),
                    busy: false,
                });
                state.worker_index.insert(key, idx);
                true
            }
        };

        if !newly_registered {
            debug!(ip = %reg.ip_address, port = reg.port, "ignoring duplicate worker registration");
            return Ok(());
        }

        info!(ip = %reg.ip_address, port = reg.port, "worker registered");
        conn.send(&NetworkMessage::acknowledgment()).await?;
        self.drain_queue().await;
        Ok(())
    }

    pub async fn accept_job(self: &Arc<Self>, msg: NetworkMessage, conn: Arc<Connection>) -> Result<()> {
        let packet: ImagePacket = msg.json_body().context("failed to decode ImagePacket")?;
        let packet_id = packet.packet_id.clone();

        let immediate = {
            let mut state = self.state.lock().unwrap();
            if state.workers.is_empty() {
                warn!(packet_id = %packet_id, "dropping job, no workers registered");
                return Ok(());
            }

            state.received += 1;
            if state.first_event.is_none() {
                state.first_event = Some(Instant::now());
            }
            state.pending.insert(
                packet_id.clone(),
                PendingRequest {
                    submitter: conn,
                    submitter_addr: msg.sender_ip_port(),
                    file_name: packet.file_name.clone(),
                    dispatched_at: None,
                },
            );

            let task = PendingTask {
                packet_id: packet_id.clone(),
                packet,
            };

            match select_and_mark_busy(&mut state) {
                Some(idx) => Some((idx, task)),
                None => {
                    state.queue.push_back(task);
                    None
                }
            }
        };

        if let Some((idx, task)) = immediate {
            self.dispatch_to(idx, task).await;
        }
        Ok(())
    }

    async fn dispatch_to(self: &Arc<Self>, idx: usize, task: PendingTask) {
        let connection = {
            let mut state = self.state.lock().unwrap();
            if let Some(pending) = state.pending.get_mut(&task.packet_id) {
                pending.dispatched_at = Some(Instant::now());
            }
            state.workers[idx].connection.clone()
        };

        let message = match NetworkMessage::with_json_body(MessageKind::ImageRequest, &task.packet) {
            Ok(m) => m,
            Err(e) => {
                warn!(packet_id = %task.packet_id, error = %e, "failed to encode ImageRequest, dropping task");
                let mut state = self.state.lock().unwrap();
                state.workers[idx].busy = false;
                return;
            }
        };

        if let Err(e) = connection.send(&message).await {
            warn!(packet_id = %task.packet_id, error = %e, "failed to dispatch job to worker, reverting busy flag");
            let mut state = self.state.lock().unwrap();
            state.workers[idx].busy = false;
            // The task is lost here, not re-enqueued: the PendingRequest
            // stays and orphans, same as a worker disconnecting mid-job.
        }
    }

    pub async fn handle_result(self: &Arc<Self>, msg: NetworkMessage) -> Result<()> {
        let packet: ImagePacket = msg.json_body().context("failed to decode ImagePacket")?;
        let packet_id = packet.packet_id.clone();

        let (submitter, should_drain, summary) = {
            let mut state = self.state.lock().unwrap();
            state.completed += 1;
            state.last_event = Some(Instant::now());

            let pending = state.pending.remove(&packet_id);
            let mut freed = false;

            match &pending {
                Some(_) => {
                    if let Some(port) = packet.slave_port {
                        if let Some(worker) = state
                            .workers
                            .iter_mut()
                            .find(|w| w.addr.ip() == msg.sender_ip && w.addr.port() == port)
                        {
                            worker.busy = false;
                            freed = true;
                        }
                    }
                }
                None => {
                    warn!(packet_id = %packet_id, "unknown packetId on ImageResponse, discarding");
                }
            }

            let summary = if state.received > 0 && state.completed == state.received {
                Some(FinalStatisticsSummary::compute(
                    &state.workers,
                    state.received,
                    state.completed,
                    state.first_event,
                    state.last_event,
                ))
            } else {
                None
            };

            (pending.map(|p| p.submitter), freed, summary)
        };

        if let Some(summary) = summary {
            summary.log();
        }

        if let Some(conn) = submitter {
            let response = NetworkMessage::with_json_body(MessageKind::ImageResponse, &packet)?;
            if conn.send(&response).await.is_err() {
                debug!(packet_id = %packet_id, "submitter disconnected before delivery, dropping result");
            }
        }

        if should_drain {
            self.drain_queue().await;
        }
        Ok(())
    }

    pub fn handle_stats(self: &Arc<Self>, msg: NetworkMessage) -> Result<()> {
        let stats: SlaveStatistics = msg.json_body().context("failed to decode SlaveStatistics")?;
        let mut state = self.state.lock().unwrap();
        match state
            .workers
            .iter_mut()
            .find(|w| w.addr.ip() == msg.sender_ip && w.addr.port() == stats.port)
        {
            Some(worker) => worker.stats = stats,
            None => warn!(port = stats.port, "statistics for unknown worker, discarding"),
        }
        Ok(())
    }

    async fn drain_queue(self: &Arc<Self>) {
        loop {
            let next = {
                let mut state = self.state.lock().unwrap();
                if state.queue.is_empty() {
                    None
                } else {
                    select_and_mark_busy(&mut state).map(|idx| {
                        let task = state.queue.pop_front().expect("checked non-empty above");
                        (idx, task)
                    })
                }
            };

            match next {
                Some((idx, task)) => self.dispatch_to(idx, task).await,
                None => break,
            }
        }
    }

    /// Number of registered workers, for diagnostics and tests.
    pub fn worker_count(&self) -> usize {
        self.state.lock().unwrap().workers.len()
    }

    /// Snapshot of `(received, completed)`, for diagnostics and tests.
    pub fn counters(&self) -> (u64, u64) {
        let state = self.state.lock().unwrap();
        (state.received, state.completed)
    }
}

impl NetworkMessage {
    fn sender_ip_port(&self) -> SocketAddr {
        SocketAddr::new(self.sender_ip, self.sender_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::policy::RoundRobinPolicy;
    use crate::model::ImagePacket;
    use crate::transport::{connect, Server};
    use tokio::sync::mpsc;

    async fn spawn_master() -> (Arc<Dispatcher>, SocketAddr) {
        let server = Server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = mpsc::channel(1024);
        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(server.serve(tx, shutdown_rx));

        let dispatcher = Dispatcher::new(Box::new(RoundRobinPolicy::new()));
        tokio::spawn(dispatcher.clone().run(rx));
        (dispatcher, addr)
    }

    async fn register_worker(master_addr: SocketAddr, worker_port: u16) -> Arc<Connection> {
        let (conn, mut rx) = connect(master_addr, tokio::sync::watch::channel(false).1).await.unwrap();
        let reg = SlaveRegistrationData {
            ip_address: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: worker_port,
        };
        conn.send(&NetworkMessage::with_json_body(MessageKind::SlaveRegister, &reg).unwrap())
            .await
            .unwrap();
        let (_, ack) = rx.recv().await.expect("ack");
        assert_eq!(ack.kind, MessageKind::Acknowledgment);
        conn
    }

    fn sample_packet(id: &str) -> ImagePacket {
        ImagePacket {
            packet_id: id.to_string(),
            file_name: "x.png".to_string(),
            image_data: vec![0u8; 16],
            width: 4,
            height: 4,
            format: "png".to_string(),
            filter_size: 3,
            slave_port: None,
        }
    }

    #[tokio::test]
    async fn registration_before_jobs_adds_exactly_one_worker() {
        let (master, master_addr) = spawn_master().await;
        let _w = register_worker(master_addr, 9100).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(master.worker_count(), 1);
    }

    #[tokio::test]
    async fn unknown_packet_id_on_response_does_not_crash_or_mutate_worker_state() {
        let (master, master_addr) = spawn_master().await;
        let _w = register_worker(master_addr, 9200).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let unknown = sample_packet("nonexistent");
        master
            .handle_result(NetworkMessage::with_json_body(MessageKind::ImageResponse, &unknown).unwrap())
            .await
            .unwrap();

        let (_, completed) = master.counters();
        assert_eq!(completed, 1);
        assert_eq!(master.worker_count(), 1);
    }
}
