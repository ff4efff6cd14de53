use crate::types::*;
use derive_new::new;
use std::rc::Rc;

/// Drops the first `count` ticks of its source, then propagates every
/// tick.  Used by [skip](crate::nodes::StreamOperators::skip).
#[derive(new)]
pub(crate) struct SkipStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    count: u32,
    #[new(default)]
    seen: u32,
    #[new(default)]
    value: T,
}

impl<T: Element> MutableNode for SkipStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        if self.seen < self.count {
            self.seen += 1;
            Ok(false)
        } else {
            self.value = self.upstream.peek_value();
            Ok(true)
        }
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<T: Element> StreamPeekRef<T> for SkipStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}
