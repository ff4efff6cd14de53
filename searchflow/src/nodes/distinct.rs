use crate::types::*;
use derive_new::new;
use std::rc::Rc;

/// Only propagates its source when its value changes.  The first value
/// always propagates, even when it equals `T::default()`.  Used by
/// [distinct](crate::nodes::StreamOperators::distinct).
#[derive(new)]
pub(crate) struct DistinctStream<T: Element> {
    source: Rc<dyn Stream<T>>,
    #[new(default)]
    value: Option<T>,
    #[new(default)]
    current: T,
}

impl<T: Element + PartialEq> MutableNode for DistinctStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        let curr = self.source.peek_value();
        if self.value.as_ref() == Some(&curr) {
            Ok(false)
        } else {
            self.current = curr.clone();
            self.value = Some(curr);
            Ok(true)
        }
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }
}

impl<T: Element + PartialEq> StreamPeekRef<T> for DistinctStream<T> {
    fn peek_ref(&self) -> &T {
        &self.current
    }
}
