use crate::types::*;
use derive_new::new;
use std::rc::Rc;

/// Ticks `initial` on the first cycle of the run, then mirrors its source.
/// If the source ticks on that first cycle as well, the source value wins.
/// Used by [start_with](crate::nodes::StreamOperators::start_with).
#[derive(new)]
pub(crate) struct StartWithStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    value: T,
}

impl<T: Element> MutableNode for StartWithStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        if state.ticked(self.upstream.clone().as_node()) {
            self.value = self.upstream.peek_value();
        }
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }

    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        state.add_callback(state.start_time());
        Ok(())
    }
}

impl<T: Element> StreamPeekRef<T> for StartWithStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}
