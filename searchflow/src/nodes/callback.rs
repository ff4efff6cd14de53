use std::cmp::Eq;
use std::hash::Hash;
use std::time::Duration;

use crate::queue::{TimeQueue, ValueAt};
use crate::types::*;

use derive_new::new;

/// A queue of values that are emitted at specified times.  Used to script
/// keystrokes in unit tests and demos.  Values pushed with
/// [push](CallBackStream::push) carry an absolute engine time, values pushed
/// with [push_after](CallBackStream::push_after) are relative to the start
/// of the run and so also work in [RunMode::RealTime](crate::RunMode::RealTime).
#[derive(new)]
pub struct CallBackStream<T: Element + Hash + Eq> {
    #[new(default)]
    value: T,
    #[new(default)]
    queue: TimeQueue<T>,
    #[new(default)]
    relative: Vec<(Duration, T)>,
}

impl<T: Element + Hash + Eq> StreamPeekRef<T> for CallBackStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}

impl<T: Element + Hash + Eq> MutableNode for CallBackStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        let mut ticked = false;
        while let Some(value) = self.queue.pop_due(state.time()) {
            self.value = value;
            ticked = true;
        }
        if let Some(callback_time) = self.queue.next_time() {
            state.add_callback(callback_time);
        }
        Ok(ticked)
    }

    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        let start_time = state.start_time();
        for (offset, value) in self.relative.drain(..) {
            self.queue.push(value, start_time + offset);
        }
        if let Some(time) = self.queue.next_time() {
            state.add_callback(time);
        }
        Ok(())
    }
}

impl<T: Element + Hash + Eq> CallBackStream<T> {
    pub fn push(&mut self, value_at: ValueAt<T>) {
        self.queue.push(value_at.value, value_at.time)
    }

    pub fn push_after(&mut self, offset: Duration, value: T) {
        self.relative.push((offset, value));
    }
}
