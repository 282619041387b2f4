//! In-memory ordering of queued tasks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use asrq_config::PriorityOrder;

use crate::task::QueueEntry;

/// Wrapper for priority queue ordering.
#[derive(Debug, Clone)]
struct PriorityEntry {
    entry: QueueEntry,
    order: PriorityOrder,
}

impl PartialEq for PriorityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityEntry {}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Greater means served first.
        let by_priority = match self.order {
            PriorityOrder::LowestFirst => other.entry.priority.cmp(&self.entry.priority),
            PriorityOrder::HighestFirst => self.entry.priority.cmp(&other.entry.priority),
        };
        by_priority
            .then_with(|| other.entry.created_at.cmp(&self.entry.created_at))
            .then_with(|| other.entry.id.cmp(&self.entry.id))
    }
}

/// Priority heap of queued tasks with FIFO tie-break.
#[derive(Debug)]
pub struct TaskHeap {
    order: PriorityOrder,
    heap: BinaryHeap<PriorityEntry>,
}

impl TaskHeap {
    /// Create an empty heap.
    pub fn new(order: PriorityOrder) -> Self {
        Self {
            order,
            heap: BinaryHeap::new(),
        }
    }

    /// Priority direction of this heap.
    pub fn order(&self) -> PriorityOrder {
        self.order
    }

    pub fn push(&mut self, entry: QueueEntry) {
        self.heap.push(PriorityEntry {
            entry,
            order: self.order,
        });
    }

    /// Remove and return the most urgent entry.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.heap.pop().map(|p| p.entry)
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.heap.peek().map(|p| &p.entry)
    }

    /// Drop the entry with this ID, if queued.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.heap.len();
        self.heap.retain(|p| p.entry.id != id);
        self.heap.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.heap.iter().any(|p| p.entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// All entries in the order `pop` would return them.
    pub fn ordered(&self) -> Vec<QueueEntry> {
        let mut entries: Vec<PriorityEntry> = self.heap.iter().cloned().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|p| p.entry).collect()
    }
}
