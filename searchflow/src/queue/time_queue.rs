use derive_new::new;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::hash::Hash;

use super::value_at::ValueAt;
use crate::types::NanoTime;

/// Values ordered by the time they fall due, earliest first.
// Keyed by ValueAt so the same value can be queued for several times.
// The same value at the same time collapses into one entry.
#[derive(new, Default, Debug)]
pub(crate) struct TimeQueue<T: Hash + Eq> {
    #[new(default)]
    queue: PriorityQueue<ValueAt<T>, Reverse<NanoTime>>,
}

impl<T: Hash + Eq> TimeQueue<T> {
    pub fn push(&mut self, value: T, time: NanoTime) {
        self.queue.push(ValueAt::new(value, time), Reverse(time));
    }

    pub fn next_time(&self) -> Option<NanoTime> {
        self.queue.peek().map(|(_, time)| time.0)
    }

    /// Pops the earliest value if it is due at `now`.
    pub fn pop_due(&mut self, now: NanoTime) -> Option<T> {
        match self.next_time() {
            Some(time) if time <= now => self.queue.pop().map(|(value_at, _)| value_at.value),
            _ => None,
        }
    }
}
