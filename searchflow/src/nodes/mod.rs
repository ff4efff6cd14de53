//! A library of Stream and Node operators and functions.
//!

mod bimap;
mod callback;
mod consumer;
mod debounce;
mod distinct;
mod finally;
mod fold;
mod graph_state;
mod map;
mod skip;
mod start_with;
mod switch_latest;
mod text_input;

pub use callback::CallBackStream;
pub use text_input::{InputError, TextInputHandle, text_input};

use bimap::*;
use consumer::*;
use debounce::*;
use distinct::*;
use finally::*;
use fold::*;
use graph_state::*;
use map::*;
use skip::*;
use start_with::*;
use switch_latest::*;

use crate::graph::*;
use crate::queue::ValueAt;
use crate::types::*;

use log::Level;
use log::log;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// Maps two [Stream]s into one using the supplied function.  Ticks when either of its sources ticks.
pub fn bimap<IN1: Element, IN2: Element, OUT: Element>(
    upstream1: Rc<dyn Stream<IN1>>,
    upstream2: Rc<dyn Stream<IN2>>,
    func: impl Fn(IN1, IN2) -> OUT + 'static,
) -> Rc<dyn Stream<OUT>> {
    BiMapStream::new(upstream1, upstream2, Box::new(func)).into_stream()
}

/// A trait containing operators that can be applied to [Node]s.
/// Used to support method chaining syntax.
pub trait NodeOperators {
    /// Emits the engine time of source ticks.
    fn ticked_at(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>>;

    /// Emits the time of source ticks relative to the start of the run.
    fn ticked_at_elapsed(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>>;

    /// Shortcut for [Graph::run] i.e. initialise and execute the graph.
    fn run(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<()>;

    fn into_graph(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<Graph>;
}

impl NodeOperators for dyn Node {
    fn ticked_at(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>> {
        let f = Box::new(|state: &mut GraphState| state.time());
        GraphStateStream::new(self.clone(), f).into_stream()
    }
    fn ticked_at_elapsed(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>> {
        let f = Box::new(|state: &mut GraphState| state.elapsed());
        GraphStateStream::new(self.clone(), f).into_stream()
    }
    fn run(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<()> {
        self.into_graph(run_mode, run_for)?.run()
    }
    fn into_graph(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<Graph> {
        Graph::new(vec![self.clone()], run_mode, run_for)
    }
}

impl<T> NodeOperators for dyn Stream<T> {
    fn ticked_at(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>> {
        self.clone().as_node().ticked_at()
    }
    fn ticked_at_elapsed(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>> {
        self.clone().as_node().ticked_at_elapsed()
    }
    fn run(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<()> {
        self.clone().as_node().run(run_mode, run_for)
    }
    fn into_graph(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<Graph> {
        self.clone().as_node().into_graph(run_mode, run_for)
    }
}

/// A trait containing operators that can be applied to [Stream]s.
/// Used to support method chaining syntax.
pub trait StreamOperators<T: Element> {
    /// Pushes every tick to the supplied [Observer].
    fn bind(self: &Rc<Self>, observer: impl Observer<T> + 'static) -> Rc<dyn Node>;
    /// Used to accumulate values, which can be retrieved after
    /// the graph has completed running. Useful for unit tests.
    fn collect(self: &Rc<Self>) -> Rc<dyn Stream<Vec<ValueAt<T>>>>;
    /// Emits the latest source value once `window` passes without another tick.
    fn debounce(self: &Rc<Self>, window: Duration) -> Rc<dyn Stream<T>>;
    /// only propagates its source if it is changed
    fn distinct(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: PartialEq;
    /// Calls `func` with the final value of the source when the graph stops.
    fn finally<F: FnOnce(T, &GraphState) -> anyhow::Result<()> + Clone + 'static>(
        self: &Rc<Self>,
        func: F,
    ) -> Rc<dyn Node>;
    /// executes supplied closure on each tick
    fn for_each(self: &Rc<Self>, func: impl Fn(T, NanoTime) + 'static) -> Rc<dyn Node>;
    /// like [for_each](StreamOperators::for_each) but an error ends the run
    fn try_for_each(
        self: &Rc<Self>,
        func: impl Fn(T, NanoTime) -> anyhow::Result<()> + 'static,
    ) -> Rc<dyn Node>;
    /// reduce/fold source by applying function
    fn fold<OUT: Element>(self: &Rc<Self>, func: impl Fn(&mut OUT, T) + 'static) -> Rc<dyn Stream<OUT>>;
    /// logs source and propagates it
    fn logged(self: &Rc<Self>, label: &str, level: Level) -> Rc<dyn Stream<T>>;
    /// Map's its source into a new Stream using the supplied closure.
    fn map<OUT: Element>(self: &Rc<Self>, func: impl Fn(T) -> OUT + 'static) -> Rc<dyn Stream<OUT>>;
    /// drops the first `count` ticks
    fn skip(self: &Rc<Self>, count: u32) -> Rc<dyn Stream<T>>;
    /// ticks `value` on the first cycle, then follows the source
    fn start_with(self: &Rc<Self>, value: T) -> Rc<dyn Stream<T>>;
    /// Runs `func` for each tick and emits the output of the latest future only.
    fn switch_latest<OUT, FUT>(self: &Rc<Self>, func: impl Fn(T) -> FUT + 'static) -> Rc<dyn Stream<OUT>>
    where
        OUT: Element + Send,
        FUT: Future<Output = OUT> + Send + 'static;
    /// Like [switch_latest](StreamOperators::switch_latest), a future that does
    /// not settle within `timeout` yields `OUT::default()`.
    fn switch_latest_with_timeout<OUT, FUT>(
        self: &Rc<Self>,
        func: impl Fn(T) -> FUT + 'static,
        timeout: Duration,
    ) -> Rc<dyn Stream<OUT>>
    where
        OUT: Element + Send,
        FUT: Future<Output = OUT> + Send + 'static;
}

impl<T> StreamOperators<T> for dyn Stream<T>
where
    T: Element + 'static,
{
    fn bind(self: &Rc<Self>, observer: impl Observer<T> + 'static) -> Rc<dyn Node> {
        self.for_each(move |value, _| observer.on_value(value))
    }

    fn collect(self: &Rc<Self>) -> Rc<dyn Stream<Vec<ValueAt<T>>>> {
        bimap(self.clone(), self.clone().as_node().ticked_at(), ValueAt::new).fold(
            |acc: &mut Vec<ValueAt<T>>, value| {
                acc.push(value);
            },
        )
    }

    fn debounce(self: &Rc<Self>, window: Duration) -> Rc<dyn Stream<T>> {
        DebounceStream::new(self.clone(), NanoTime::from(window)).into_stream()
    }

    fn distinct(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: PartialEq,
    {
        DistinctStream::new(self.clone()).into_stream()
    }

    fn finally<F: FnOnce(T, &GraphState) -> anyhow::Result<()> + Clone + 'static>(
        self: &Rc<Self>,
        func: F,
    ) -> Rc<dyn Node> {
        FinallyNode::new(self.clone(), func).into_node()
    }

    fn for_each(self: &Rc<Self>, func: impl Fn(T, NanoTime) + 'static) -> Rc<dyn Node> {
        self.try_for_each(move |value, time| {
            func(value, time);
            Ok(())
        })
    }

    fn try_for_each(
        self: &Rc<Self>,
        func: impl Fn(T, NanoTime) -> anyhow::Result<()> + 'static,
    ) -> Rc<dyn Node> {
        ConsumerNode::new(self.clone(), Box::new(func)).into_node()
    }

    fn fold<OUT: Element>(self: &Rc<Self>, func: impl Fn(&mut OUT, T) + 'static) -> Rc<dyn Stream<OUT>> {
        FoldStream::new(self.clone(), Box::new(func)).into_stream()
    }

    fn logged(self: &Rc<Self>, label: &str, level: Level) -> Rc<dyn Stream<T>> {
        if log::log_enabled!(level) {
            let lbl = label.to_string();
            let func = move |value, time: NanoTime| {
                log!(target:"searchflow", level, "{:} {:} {:?}", time.pretty(), lbl, value);
                value
            };
            bimap(self.clone(), self.clone().as_node().ticked_at_elapsed(), func)
        } else {
            self.clone()
        }
    }

    fn map<OUT: Element>(self: &Rc<Self>, func: impl Fn(T) -> OUT + 'static) -> Rc<dyn Stream<OUT>> {
        MapStream::new(self.clone(), Box::new(func)).into_stream()
    }

    fn skip(self: &Rc<Self>, count: u32) -> Rc<dyn Stream<T>> {
        SkipStream::new(self.clone(), count).into_stream()
    }

    fn start_with(self: &Rc<Self>, value: T) -> Rc<dyn Stream<T>> {
        StartWithStream::new(self.clone(), value).into_stream()
    }

    fn switch_latest<OUT, FUT>(self: &Rc<Self>, func: impl Fn(T) -> FUT + 'static) -> Rc<dyn Stream<OUT>>
    where
        OUT: Element + Send,
        FUT: Future<Output = OUT> + Send + 'static,
    {
        SwitchLatestStream::new(self.clone(), func, None).into_stream()
    }

    fn switch_latest_with_timeout<OUT, FUT>(
        self: &Rc<Self>,
        func: impl Fn(T) -> FUT + 'static,
        timeout: Duration,
    ) -> Rc<dyn Stream<OUT>>
    where
        OUT: Element + Send,
        FUT: Future<Output = OUT> + Send + 'static,
    {
        SwitchLatestStream::new(self.clone(), func, Some(timeout)).into_stream()
    }
}
