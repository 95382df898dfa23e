use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Frame counters shared between the ingest loop and the per-frame tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    admitted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    decode_failures: AtomicU64,
    stage_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub admitted: u64,
    pub dropped: u64,
    pub completed: u64,
    pub decode_failures: u64,
    pub stage_failures: u64,
}

impl PipelineStats {
    pub fn frame_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failed(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stage_failed(&self) {
        self.stage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            stage_failures: self.stage_failures.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Admitted frames that have not finished yet.
    pub fn in_flight(&self) -> u64 {
        self.admitted
            .saturating_sub(self.completed + self.decode_failures + self.stage_failures)
    }

    /// Holds once every admitted frame has been drained.
    pub fn is_balanced(&self) -> bool {
        self.admitted + self.dropped == self.received && self.in_flight() == 0
    }
}
