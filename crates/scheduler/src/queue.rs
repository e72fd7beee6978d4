//! Priority-ordered ready queue with blocking consumers.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::descriptor::TaskDescriptor;
use crate::types::{DispatchRank, TaskPriority};

/// Heap entry ordered so the max-heap yields the smallest [`DispatchRank`].
struct QueueEntry(Arc<TaskDescriptor>);

impl QueueEntry {
    fn rank(&self) -> DispatchRank {
        self.0.dispatch_rank()
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap pops the greatest element.
        other.rank().cmp(&self.rank())
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl Eq for QueueEntry {}

struct QueueState {
    heap: BinaryHeap<QueueEntry>,
    closed: bool,
}

/// Thread-safe priority queue of descriptors awaiting a worker.
///
/// Pushes never block. Pops block until an entry is available or the
/// queue is closed and empty.
pub struct ReadyQueue {
    inner: Mutex<QueueState>,
    available: Condvar,
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a descriptor; hands it back if the queue is closed.
    pub fn push(&self, descriptor: Arc<TaskDescriptor>) -> Result<(), Arc<TaskDescriptor>> {
        let mut guard = self.inner.lock();
        if guard.closed {
            return Err(descriptor);
        }
        guard.heap.push(QueueEntry(descriptor));
        self.available.notify_one();
        Ok(())
    }

    /// Block until a descriptor is available, or return `None` once the
    /// queue is closed and fully drained.
    pub fn pop_blocking(&self) -> Option<Arc<TaskDescriptor>> {
        let mut guard = self.inner.lock();
        loop {
            if let Some(entry) = guard.heap.pop() {
                return Some(entry.0);
            }
            if guard.closed {
                return None;
            }
            self.available.wait(&mut guard);
        }
    }

    /// Remove the descriptor with `id`, if it is still queued.
    pub fn remove(&self, id: u64) -> Option<Arc<TaskDescriptor>> {
        let mut guard = self.inner.lock();
        let mut entries = std::mem::take(&mut guard.heap).into_vec();
        let removed = entries
            .iter()
            .position(|e| e.0.id() == id)
            .map(|pos| entries.swap_remove(pos).0);
        guard.heap = BinaryHeap::from(entries);
        removed
    }

    /// Point-in-time copy of the queued descriptors in dispatch order.
    pub fn entries(&self) -> Vec<Arc<TaskDescriptor>> {
        let guard = self.inner.lock();
        let mut entries: Vec<Arc<TaskDescriptor>> =
            guard.heap.iter().map(|e| Arc::clone(&e.0)).collect();
        drop(guard);
        entries.sort_by_key(|d| d.dispatch_rank());
        entries
    }

    /// Linear scan for the first queued descriptor matching `predicate`.
    pub fn find<P>(&self, mut predicate: P) -> Option<Arc<TaskDescriptor>>
    where
        P: FnMut(&TaskDescriptor) -> bool,
    {
        let guard = self.inner.lock();
        guard
            .heap
            .iter()
            .find(|e| predicate(&e.0))
            .map(|e| Arc::clone(&e.0))
    }

    /// Stop accepting pushes and wake all blocked consumers. Queued entries
    /// stay and are still handed out by `pop_blocking`.
    pub fn close(&self) {
        let mut guard = self.inner.lock();
        guard.closed = true;
        self.available.notify_all();
    }

    /// Close the queue and take everything still in it, in dispatch order.
    pub fn close_and_drain(&self) -> Vec<Arc<TaskDescriptor>> {
        let mut guard = self.inner.lock();
        guard.closed = true;
        let heap = std::mem::take(&mut guard.heap);
        self.available.notify_all();
        drop(guard);
        heap.into_sorted_vec().into_iter().rev().map(|e| e.0).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of queued descriptors per priority class.
    pub fn len_by_priority(&self) -> HashMap<TaskPriority, usize> {
        let guard = self.inner.lock();
        let mut counts = HashMap::new();
        for entry in guard.heap.iter() {
            *counts.entry(entry.0.priority()).or_default() += 1;
        }
        counts
    }
}
