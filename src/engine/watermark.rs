//! Low-watermark tracking for out-of-order task completion.
//!
//! Keys register in start order. When a key completes, the watermark moves
//! to the highest key such that every registered key at or below it has
//! completed — so a persisted cursor never skips past an outstanding URL.

use std::collections::VecDeque;

use parking_lot::Mutex;

#[derive(Default)]
pub struct Watermark {
    window: Mutex<VecDeque<(Vec<u8>, bool)>>,
}

impl Watermark {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key in start order.
    pub fn register(&self, key: Vec<u8>) {
        self.window.lock().push_back((key, false));
    }

    /// Mark `key` complete. Returns the new watermark when the frontier
    /// advanced, i.e. the highest key whose predecessors (and itself) are
    /// all complete.
    pub fn complete(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut window = self.window.lock();
        if let Some(slot) = window.iter_mut().find(|(k, _)| k == key) {
            slot.1 = true;
        }
        let mut advanced = None;
        while matches!(window.front(), Some((_, true))) {
            if let Some((k, _)) = window.pop_front() {
                advanced = Some(k);
            }
        }
        advanced
    }
}
