use derive_new::new;

use std::boxed::Box;
use std::rc::Rc;

use crate::types::*;

/// Applies a fallible function to each tick of its source.  It is a
/// [Node] - it doesn't produce anything.  An error ends the run.  Used by
/// [for_each](crate::nodes::StreamOperators::for_each),
/// [try_for_each](crate::nodes::StreamOperators::try_for_each) and
/// [bind](crate::nodes::StreamOperators::bind).
#[derive(new)]
pub(crate) struct ConsumerNode<IN> {
    upstream: Rc<dyn Stream<IN>>,
    func: Box<dyn Fn(IN, NanoTime) -> anyhow::Result<()>>,
}

impl<IN: Clone + 'static> MutableNode for ConsumerNode<IN> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        (self.func)(self.upstream.peek_value(), state.time())?;
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}
