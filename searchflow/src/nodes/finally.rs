use crate::types::*;
use derive_new::new;
use std::rc::Rc;

/// Tracks the latest value of its source and hands it to `finally`
/// when the graph stops.
#[derive(new)]
pub(crate) struct FinallyNode<T: Element, F: FnOnce(T, &GraphState) -> anyhow::Result<()> + Clone> {
    source: Rc<dyn Stream<T>>,
    finally: F,
    #[new(default)]
    value: T,
}

impl<T: Element, F: FnOnce(T, &GraphState) -> anyhow::Result<()> + Clone> MutableNode
    for FinallyNode<T, F>
{
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        self.value = self.source.peek_value();
        Ok(true)
    }
    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }
    fn stop(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        (self.finally.clone())(self.value.clone(), state)
    }
}
