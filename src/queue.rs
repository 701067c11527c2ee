//! Reminder queue: a min-heap of pending tasks keyed by `(priority rank, due)`.
//!
//! Arbitrary entries are removed lazily. `remove` drops the id from the live
//! map and the stale heap node is discarded once it reaches the top, so the
//! top of the heap is always a live entry.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use chrono::NaiveDateTime;

use crate::model::{Priority, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub priority: Priority,
    pub due: NaiveDateTime,
    pub task: TaskId,
}

impl QueueEntry {
    pub fn for_task(task: &Task) -> Self {
        Self {
            priority: task.priority,
            due: task.due,
            task: task.id,
        }
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority.rank(), self.due, self.task).cmp(&(other.priority.rank(), other.due, other.task))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
    live: HashMap<TaskId, QueueEntry>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh queue from the full task list: one entry per pending task.
    pub fn build(tasks: &[Task]) -> Self {
        let mut queue = Self::new();
        for task in tasks {
            if task.is_pending() {
                queue.insert(QueueEntry::for_task(task));
            }
        }
        queue
    }

    /// Returns false, leaving the queue unchanged, if the task already has an entry.
    pub fn insert(&mut self, entry: QueueEntry) -> bool {
        if self.live.contains_key(&entry.task) {
            return false;
        }
        self.live.insert(entry.task, entry);
        self.heap.push(Reverse(entry));
        true
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.heap.peek().map(|Reverse(e)| e)
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        let Reverse(entry) = self.heap.pop()?;
        self.live.remove(&entry.task);
        self.discard_stale();
        Some(entry)
    }

    pub fn remove(&mut self, id: TaskId) -> Option<QueueEntry> {
        let entry = self.live.remove(&id)?;
        self.discard_stale();
        self.compact();
        Some(entry)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live entries in queue order.
    pub fn entries(&self) -> Vec<QueueEntry> {
        let mut entries: Vec<QueueEntry> = self.live.values().copied().collect();
        entries.sort();
        entries
    }

    fn is_live(&self, entry: &QueueEntry) -> bool {
        self.live.get(&entry.task) == Some(entry)
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.is_live(top) {
                break;
            }
            self.heap.pop();
        }
    }

    fn compact(&mut self) {
        if self.heap.len() > 2 * self.live.len() + 16 {
            self.heap = self.live.values().copied().map(Reverse).collect();
        }
    }
}
