//! Observers for normalized boxes.
//!
//! Normalization is a pure function. Callers who want to see the boxes that
//! are handed to the sampler install an observer; the default does nothing.

use std::sync::{Arc, Mutex};

use crate::boxes::RoiBox;

/// Observer notified after every normalization.
pub trait BoxObserver: Send + Sync {
    /// Called with the normalized boxes, in input order.
    fn on_normalized(&self, boxes: &[RoiBox]);
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BoxObserver for NoopObserver {
    fn on_normalized(&self, _boxes: &[RoiBox]) {}
}

/// Observer that logs normalized boxes through `tracing` at debug level.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Maximum number of boxes logged individually per call.
    pub max_logged: usize,
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self { max_logged: 16 }
    }
}

impl TracingObserver {
    pub fn new(max_logged: usize) -> Self {
        Self { max_logged }
    }
}

impl BoxObserver for TracingObserver {
    fn on_normalized(&self, boxes: &[RoiBox]) {
        tracing::debug!("Normalized {} boxes", boxes.len());
        for (i, b) in boxes.iter().take(self.max_logged).enumerate() {
            tracing::debug!(
                "  box {}: x [{:.6}, {:.6}] y [{:.6}, {:.6}]",
                i,
                b.x1,
                b.x2,
                b.y1,
                b.y2
            );
        }
        if boxes.len() > self.max_logged {
            tracing::debug!("  ... {} more", boxes.len() - self.max_logged);
        }
    }
}

/// Observer that records every batch of normalized boxes.
#[derive(Debug, Clone, Default)]
pub struct HistoryObserver {
    history: Arc<Mutex<Vec<Vec<RoiBox>>>>,
}

impl HistoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded batches, oldest first.
    pub fn history(&self) -> Vec<Vec<RoiBox>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The most recent batch, if any.
    pub fn last(&self) -> Option<Vec<RoiBox>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }

    pub fn clear(&self) {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl BoxObserver for HistoryObserver {
    fn on_normalized(&self, boxes: &[RoiBox]) {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(boxes.to_vec());
    }
}
