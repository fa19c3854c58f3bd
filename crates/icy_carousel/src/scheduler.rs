use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Work the logic side runs at a later turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScheduledTask {
    /// Full visible-first load pass
    LoadAll,
    Load(usize),
    /// Load newly visible items after a scroll
    ScrollPass,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Timer {
    due: Instant,
    seq: u64,
    task: ScheduledTask,
}

/// Delayed tasks ordered by due time, ties in scheduling order.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Timer>>,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Instant, task: ScheduledTask) {
        self.seq += 1;
        self.heap.push(Reverse(Timer { due, seq: self.seq, task }));
    }

    pub fn schedule_after(&mut self, now: Instant, delay: Duration, task: ScheduledTask) {
        self.schedule(now + delay, task);
    }

    /// Schedules `task` unless an identical one is already queued.
    pub fn schedule_once(&mut self, due: Instant, task: ScheduledTask) -> bool {
        if self.contains(task) {
            return false;
        }
        self.schedule(due, task);
        true
    }

    /// Makes sure `task` runs no later than `due`. An identical task queued
    /// for later is pulled forward; one queued earlier is left alone.
    pub fn schedule_no_later(&mut self, due: Instant, task: ScheduledTask) -> bool {
        if self.heap.iter().any(|Reverse(timer)| timer.task == task && timer.due <= due) {
            return false;
        }
        self.heap.retain(|Reverse(timer)| timer.task != task);
        self.schedule(due, task);
        true
    }

    pub fn contains(&self, task: ScheduledTask) -> bool {
        self.heap.iter().any(|Reverse(timer)| timer.task == task)
    }

    /// Removes and returns every task due at `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<ScheduledTask> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|Reverse(timer)| timer.due <= now) {
            if let Some(Reverse(timer)) = self.heap.pop() {
                due.push(timer.task);
            }
        }
        due
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(timer)| timer.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
