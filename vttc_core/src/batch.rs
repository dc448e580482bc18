//! Batch and batch accounting
//!
//! A [`Batch`] is the resolved plan plus the discovered work items. Running it
//! produces a [`BatchResult`] with per-item failures; item failures never abort
//! the batch.

use crate::discovery::WorkItem;
use crate::formats::EncodingPlan;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Batch {
    plan: EncodingPlan,
    items: Vec<WorkItem>,
}

impl Batch {
    pub fn new(plan: EncodingPlan, items: Vec<WorkItem>) -> Self {
        Self { plan, items }
    }

    pub fn plan(&self) -> &EncodingPlan {
        &self.plan
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One failed item: where it came from, where it was going, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures in discovery order.
    pub failures: Vec<ItemFailure>,
    /// Total size of inputs that converted successfully.
    pub input_bytes: u64,
    /// Total size of the outputs written.
    pub output_bytes: u64,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self, input_bytes: u64, output_bytes: u64) {
        self.attempted += 1;
        self.succeeded += 1;
        self.input_bytes += input_bytes;
        self.output_bytes += output_bytes;
    }

    pub fn fail(&mut self, item: &WorkItem, detail: String) {
        self.attempted += 1;
        self.failed += 1;
        self.failures.push(ItemFailure {
            input_path: item.input_path().to_path_buf(),
            output_path: item.output_path().to_path_buf(),
            detail,
        });
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.attempted as f64) * 100.0
        }
    }
}
