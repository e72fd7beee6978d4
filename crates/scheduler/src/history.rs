use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::snapshot::TaskSnapshot;

/// Bounded FIFO of finished-task snapshots. Oldest entries are evicted
/// first once `limit` is reached; a limit of 0 retains nothing.
pub struct HistoryBuffer {
    limit: usize,
    entries: Mutex<VecDeque<TaskSnapshot>>,
}

impl HistoryBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Mutex::new(VecDeque::with_capacity(limit.min(1024))),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append a snapshot, returning the evicted one if the buffer was full.
    pub fn push(&self, snapshot: TaskSnapshot) -> Option<TaskSnapshot> {
        if self.limit == 0 {
            return Some(snapshot);
        }
        let mut entries = self.entries.lock();
        let evicted = if entries.len() >= self.limit {
            entries.pop_front()
        } else {
            None
        };
        entries.push_back(snapshot);
        evicted
    }

    /// Copy of the current contents, oldest first.
    pub fn to_vec(&self) -> Vec<TaskSnapshot> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
