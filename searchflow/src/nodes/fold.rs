use crate::types::*;

use derive_new::new;

use std::rc::Rc;

/// Folds each source tick into an accumulated value.  Used by
/// [fold](crate::nodes::StreamOperators::fold) and
/// [collect](crate::nodes::StreamOperators::collect).
#[derive(new)]
pub(crate) struct FoldStream<IN: Element, OUT: Element> {
    upstream: Rc<dyn Stream<IN>>,
    func: Box<dyn Fn(&mut OUT, IN)>,
    #[new(default)]
    value: OUT,
}

impl<IN: Element, OUT: Element> MutableNode for FoldStream<IN, OUT> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        (self.func)(&mut self.value, self.upstream.peek_value());
        Ok(true)
    }
    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<IN: Element, OUT: Element> StreamPeekRef<OUT> for FoldStream<IN, OUT> {
    fn peek_ref(&self) -> &OUT {
        &self.value
    }
}

#[cfg(test)]
mod tests {

    use crate::graph::*;
    use crate::nodes::*;
    use crate::queue::ValueAt;
    use crate::types::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn fold_counts_keystrokes() {
        let input: Rc<RefCell<CallBackStream<String>>> = Rc::new(RefCell::new(CallBackStream::new()));
        for (i, query) in ["r", "ru", "rus"].iter().enumerate() {
            input
                .borrow_mut()
                .push(ValueAt::new(query.to_string(), NanoTime::new(100 * (i as u64 + 1))));
        }
        let count = input.clone().as_stream().fold(|acc: &mut u32, _| *acc += 1);
        let captured = count.collect();
        assert_eq!(count.peek_value(), 0);
        captured
            .run(RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Forever)
            .unwrap();
        let expected = vec![
            ValueAt::new(1, NanoTime::new(100)),
            ValueAt::new(2, NanoTime::new(200)),
            ValueAt::new(3, NanoTime::new(300)),
        ];
        assert_eq!(expected, captured.peek_value());
        assert_eq!(3, count.peek_value());
    }
}
