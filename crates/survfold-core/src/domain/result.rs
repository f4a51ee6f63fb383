//! Best-so-far tracking and the per-fold report record.

use serde::{Deserialize, Serialize};

/// Highest validation concordance index seen so far and when it occurred.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BestResult {
    pub c_index: f64,
    pub epoch: usize,
}

impl BestResult {
    pub fn new(c_index: f64, epoch: usize) -> Self {
        Self { c_index, epoch }
    }

    /// Record an epoch's score. Only a strictly greater score replaces the
    /// current best; returns whether it did.
    pub fn observe(&mut self, epoch: usize, c_index: f64) -> bool {
        if c_index > self.c_index {
            self.c_index = c_index;
            self.epoch = epoch;
            true
        } else {
            false
        }
    }
}

/// Report returned alongside the best result, keyed under `result`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FoldReport {
    pub fold: usize,
    /// `(c_index, epoch)` of the best validation score.
    pub result: (f64, usize),
}

impl FoldReport {
    pub fn new(fold: usize, best: BestResult) -> Self {
        Self {
            fold,
            result: (best.c_index, best.epoch),
        }
    }
}
