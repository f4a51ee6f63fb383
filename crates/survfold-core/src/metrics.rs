//! Process-wide training counters.
//!
//! The trainer bumps these as folds progress; [`Metrics::flush`] reports them
//! in one `info!` event when a cross-validation window ends.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub static METRICS: Metrics = Metrics::new();

/// Counted training milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    FoldsCompleted,
    EpochsRun,
    CheckpointsSaved,
}

impl Counter {
    const ALL: [Counter; 3] = [
        Counter::FoldsCompleted,
        Counter::EpochsRun,
        Counter::CheckpointsSaved,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Counter::FoldsCompleted => "folds_completed",
            Counter::EpochsRun => "epochs_run",
            Counter::CheckpointsSaved => "checkpoints_saved",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub folds_completed: u64,
    pub epochs_run: u64,
    pub checkpoints_saved: u64,
}

pub struct Metrics {
    counters: [AtomicU64; 3],
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            counters: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    pub fn inc(&self, counter: Counter) {
        self.counters[counter.slot()].fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = counter.name(), "counter incremented");
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.slot()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            folds_completed: self.get(Counter::FoldsCompleted),
            epochs_run: self.get(Counter::EpochsRun),
            checkpoints_saved: self.get(Counter::CheckpointsSaved),
        }
    }

    /// Report every counter in a single event.
    pub fn flush(&self) -> MetricsSnapshot {
        let snap = self.snapshot();
        tracing::info!(
            metric = "flush",
            folds_completed = snap.folds_completed,
            epochs_run = snap.epochs_run,
            checkpoints_saved = snap.checkpoints_saved,
        );
        snap
    }

    pub fn reset(&self) {
        for counter in Counter::ALL {
            self.counters[counter.slot()].store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let m = Metrics::new();
        m.inc(Counter::EpochsRun);
        m.inc(Counter::EpochsRun);
        m.inc(Counter::CheckpointsSaved);
        assert_eq!(
            m.snapshot(),
            MetricsSnapshot {
                folds_completed: 0,
                epochs_run: 2,
                checkpoints_saved: 1,
            }
        );
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        for counter in Counter::ALL {
            m.inc(counter);
        }
        assert_eq!(m.flush().folds_completed, 1);
        m.reset();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }
}
