//! # Worker Selection Policies
//!
//! `selectWorker` is pluggable: round-robin and minimum-expected-latency are
//! interchangeable implementations of the same trait. The choice is made
//! once at master startup (`--policy`) and never changes for the life of
//! the process.

use crate::master::registry::WorkerRecord;

/// Picks one currently-free worker, or none if every worker is busy (or
/// there are no workers at all). Implementations must walk `workers` in
/// registry order so ties resolve to "first registered, first picked."
pub trait SelectionPolicy: Send {
    fn select(&mut self, workers: &[WorkerRecord]) -> Option<usize>;
}

fn free_indices(workers: &[WorkerRecord]) -> Vec<usize> {
    workers
        .iter()
        .enumerate()
        .filter(|(_, w)| !w.busy)
        .map(|(i, _)| i)
        .collect()
}

/// Monotonically incremented counter, wrapped modulo the current free-worker
/// count. The counter itself wraps back to zero once it exceeds one
/// million to prevent unbounded growth — this is independent of (and
/// usually out of sync with) the free-worker count, so the worker it picks
/// shifts unpredictably as workers go busy/free. That's an accepted
/// tension, not a bug to fix.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    counter: u64,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for RoundRobinPolicy {
    fn select(&mut self, workers: &[WorkerRecord]) -> Option<usize> {
        let free = free_indices(workers);
        if free.is_empty() {
            return None;
        }
        let chosen = free[(self.counter as usize) % free.len()];
        self.counter += 1;
        if self.counter > 1_000_000 {
            self.counter = 0;
        }
        Some(chosen)
    }
}

/// Among free workers, picks the one with the lowest `averageProcessingTime`.
/// Workers with zero completed tasks are treated as having the lowest
/// possible value, so an untested worker always wins over a proven one.
#[derive(Debug, Default)]
pub struct MinAvgLatencyPolicy;

impl MinAvgLatencyPolicy {
    pub fn new() -> Self {
        Self
    }

    fn rank(worker: &WorkerRecord) -> f64 {
        if worker.stats.tasks_completed == 0 {
            f64::NEG_INFINITY
        } else {
            worker.stats.average_processing_time
        }
    }
}

impl SelectionPolicy for MinAvgLatencyPolicy {
    fn select(&mut self, workers: &[WorkerRecord]) -> Option<usize> {
        workers
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.busy)
            .min_by(|(_, a), (_, b)| {
                Self::rank(a)
                    .partial_cmp(&Self::rank(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }
}
