use crate::types::*;
use derive_new::new;
use std::rc::Rc;

/// Emits the latest value of its source once `window` has passed without
/// the source ticking again.  Each source tick restarts the window, so
/// only the last value of a burst survives.  Used by
/// [debounce](crate::nodes::StreamOperators::debounce).
#[derive(new)]
pub(crate) struct DebounceStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    window: NanoTime,
    #[new(default)]
    pending: Option<T>,
    #[new(default)]
    deadline: NanoTime,
    #[new(default)]
    value: T,
}

impl<T: Element> MutableNode for DebounceStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        let now = state.time();
        if state.ticked(self.upstream.clone().as_node()) {
            self.pending = Some(self.upstream.peek_value());
            self.deadline = now + self.window;
            if self.window > NanoTime::ZERO {
                // earlier callbacks still fire but find the deadline moved on
                state.add_callback(self.deadline);
                return Ok(false);
            }
        }
        if now >= self.deadline {
            if let Some(value) = self.pending.take() {
                self.value = value;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<T: Element> StreamPeekRef<T> for DebounceStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}
