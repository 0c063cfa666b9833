//! # Final Statistics Summary
//!
//! Emitted whenever `completed == received` and `received > 0` — edge
//! triggered on every `ImageResponse`, so it fires again each time a fresh
//! batch of jobs drains to zero.

use crate::master::registry::WorkerRecord;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone)]
pub struct FinalStatisticsSummary {
    pub received: u64,
    pub completed: u64,
    pub wall_clock_span: Duration,
    pub per_worker_share: Vec<(SocketAddr, u64)>,
    pub balancing_deviation: f64,
}

impl FinalStatisticsSummary {
    pub fn compute(
        workers: &[WorkerRecord],
        received: u64,
        completed: u64,
        first_event: Option<Instant>,
        last_event: Option<Instant>,
    ) -> Self {
        let per_worker_share: Vec<(SocketAddr, u64)> = workers
            .iter()
            .map(|w| (w.addr, w.stats.tasks_completed))
            .collect();

        let balancing_deviation = if workers.is_empty() {
            0.0
        } else {
            let mean = completed as f64 / workers.len() as f64;
            let variance = per_worker_share
                .iter()
                .map(|(_, count)| {
                    let delta = *count as f64 - mean;
                    delta * delta
                })
                .sum::<f64>()
                / workers.len() as f64;
            variance.sqrt()
        };

        let wall_clock_span = match (first_event, last_event) {
            (Some(first), Some(last)) => last.saturating_duration_since(first),
            _ => Duration::ZERO,
        };

        Self {
            received,
            completed,
            wall_clock_span,
            per_worker_share,
            balancing_deviation,
        }
    }

    pub fn log(&self) {
        let shares: Vec<String> = self
            .per_worker_share
            .iter()
            .map(|(addr, count)| format!("{addr}={count}"))
            .collect();
        info!(
            received = self.received,
            completed = self.completed,
            wall_clock_span_secs = self.wall_clock_span.as_secs_f64(),
            balancing_deviation = self.balancing_deviation,
            per_worker = %shares.join(", "),
            "batch drained: all received jobs completed"
        );
    }
}
