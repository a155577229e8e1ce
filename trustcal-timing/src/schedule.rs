use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

/// Single-shot tasks keyed by deadline, polled from the event loop.
///
/// Tasks with equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    tasks: BTreeMap<(u64, TaskId), T>,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            tasks: BTreeMap::new(),
        }
    }

    pub fn schedule_at(&mut self, due_ns: u64, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert((due_ns, id), task);
        id
    }

    pub fn schedule_after(&mut self, now_ns: u64, delay: Duration, task: T) -> TaskId {
        self.schedule_at(now_ns.saturating_add(delay.as_nanos() as u64), task)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.keys().next().map(|(due, _)| *due)
    }

    /// Removes and returns the earliest task whose deadline has passed.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<T> {
        match self.next_deadline() {
            Some(due) if due <= now_ns => self.tasks.pop_first().map(|(_, task)| task),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
