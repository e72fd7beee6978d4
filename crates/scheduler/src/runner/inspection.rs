use crate::snapshot::{display_order, TaskSnapshot};

use super::Scheduler;

impl Scheduler {
    /// Snapshots of every descriptor in the ready queue, in dispatch order.
    pub fn collect_queued(&self) -> Vec<TaskSnapshot> {
        self.shared
            .queue
            .entries()
            .iter()
            .map(|d| d.snapshot())
            .collect()
    }

    /// Snapshots of every descriptor currently executing, by id.
    pub fn collect_processing(&self) -> Vec<TaskSnapshot> {
        let mut snapshots: Vec<TaskSnapshot> = self
            .shared
            .processing
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    /// Copy of the history buffer, oldest first.
    pub fn collect_history(&self) -> Vec<TaskSnapshot> {
        self.shared.history.to_vec()
    }

    /// Queued and processing snapshots merged for reporting, ordered by
    /// state, then priority, then id.
    pub fn collect_active(&self) -> Vec<TaskSnapshot> {
        let mut snapshots = self.collect_processing();
        snapshots.extend(self.collect_queued());
        snapshots.sort_by(display_order);
        snapshots
    }

    pub fn queued_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn processing_len(&self) -> usize {
        self.shared.processing.len()
    }

    pub fn history_len(&self) -> usize {
        self.shared.history.len()
    }
}
