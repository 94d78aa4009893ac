//! The bounded priority-FIFO task queue (`spec.md` §4.6 Scheduling model).
//! A `BinaryHeap` ordered by `(priority, insertion sequence)` gives FIFO
//! delivery within a priority band while always preferring a strictly
//! higher one, matching the "no strictly-lower priority is dequeued while a
//! strictly-higher one can be accepted" guarantee.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

use tokio::sync::Notify;
use xpost_common::XpostError;
use xpost_core::SyncTask;

struct QueuedTask {
    task: SyncTask,
    sequence: u64,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority == other.task.priority && self.sequence == other.sequence
    }
}
impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; for equal priority, earlier sequence first
        // (a max-heap, so the lower sequence must compare "greater").
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

pub struct TaskQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    notify: Notify,
    capacity: usize,
    next_sequence: AtomicU64,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            capacity,
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn push(&self, task: SyncTask) -> Result<(), XpostError> {
        let mut heap = self.heap.lock().unwrap();
        if heap.len() >= self.capacity {
            return Err(XpostError::queue_full(self.capacity));
        }
        let sequence = self.next_sequence.fetch_add(1, AtomicOrdering::Relaxed);
        heap.push(QueuedTask { task, sequence });
        drop(heap);
        self.notify.notify_one();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    /// Waits until a task is available and pops the highest-priority one.
    pub async fn pop(&self) -> SyncTask {
        loop {
            if let Some(queued) = self.heap.lock().unwrap().pop() {
                return queued.task;
            }
            self.notify.notified().await;
        }
    }
}
