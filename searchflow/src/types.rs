use derive_new::new;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

pub use crate::graph::GraphState;
pub use crate::time::*;

/// What a node is wired to.  A tick of an `active` upstream cycles the
/// node, `passive` upstreams are only read and just constrain its layer.
#[derive(new, Default)]
pub struct UpStreams {
    pub active: Vec<Rc<dyn Node>>,
    pub passive: Vec<Rc<dyn Node>>,
}

/// Values carried by a [Stream].  Wrap large values in an [Rc] so fan-out
/// clones a pointer.
#[doc(hidden)]
pub trait Element: Debug + Clone + Default + 'static {}

impl<T> Element for T where T: Debug + Clone + Default + 'static {}

/// Implement this trait to create your own [Node].
pub trait MutableNode {
    /// Called when an active upstream ticked or a requested callback fell
    /// due.  Returns true if the node ticked.  An error ends the run.
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool>;
    /// Called once, at wiring time.
    fn upstreams(&self) -> UpStreams {
        UpStreams::default()
    }
    /// Called after wiring.  Acquire notifiers and validate the run mode here.
    #[allow(unused_variables)]
    fn setup(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        Ok(())
    }
    /// Called before the first cycle, engine time is the start time.
    #[allow(unused_variables)]
    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        Ok(())
    }
    /// Called after the last cycle.
    #[allow(unused_variables)]
    fn stop(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        Ok(())
    }
    /// Called after stop.  Release tasks and channels here.
    #[allow(unused_variables)]
    fn teardown(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        Ok(())
    }

    fn type_name(&self) -> String {
        tynm::type_name::<Self>()
    }
}

/// A wiring point in the graph.  The graph holds nodes behind shared
/// references, so this is [MutableNode] through a [RefCell].
pub trait Node: MutableNode {
    fn cycle(&self, state: &mut GraphState) -> anyhow::Result<bool>;
    fn setup(&self, state: &mut GraphState) -> anyhow::Result<()>;
    fn start(&self, state: &mut GraphState) -> anyhow::Result<()>;
    fn stop(&self, state: &mut GraphState) -> anyhow::Result<()>;
    fn teardown(&self, state: &mut GraphState) -> anyhow::Result<()>;
}

/// Implemented by a [MutableNode] that holds a current value.
pub trait StreamPeekRef<T>: MutableNode {
    fn peek_ref(&self) -> &T;
}

/// Reads the current value of a [Stream].  Before its first tick this is
/// whatever the stream was built with, usually `T::default()`.
pub trait StreamPeek<T> {
    fn peek_value(&self) -> T;
}

/// A [Node] with a current value.  Any number of downstreams may share one
/// stream, each reads the same value.
pub trait Stream<T>: Node + StreamPeek<T> + AsNode {}

/// A write-only sink that receives every value of the stream it is bound to.
/// See [bind](crate::nodes::StreamOperators::bind).
pub trait Observer<T> {
    fn on_value(&self, value: T);
}

impl<T, F: Fn(T)> Observer<T> for F {
    fn on_value(&self, value: T) {
        self(value)
    }
}

impl<NODE: MutableNode> Node for RefCell<NODE> {
    fn cycle(&self, state: &mut GraphState) -> anyhow::Result<bool> {
        self.borrow_mut().cycle(state)
    }
    fn setup(&self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().setup(state)
    }
    fn start(&self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().start(state)
    }
    fn stop(&self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().stop(state)
    }
    fn teardown(&self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().teardown(state)
    }
}

impl<NODE: MutableNode> MutableNode for RefCell<NODE> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        self.get_mut().cycle(state)
    }
    fn upstreams(&self) -> UpStreams {
        self.borrow().upstreams()
    }
    fn setup(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        self.get_mut().setup(state)
    }
    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        self.get_mut().start(state)
    }
    fn stop(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        self.get_mut().stop(state)
    }
    fn teardown(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        self.get_mut().teardown(state)
    }
    fn type_name(&self) -> String {
        tynm::type_name::<NODE>()
    }
}

impl<STREAM, T> StreamPeek<T> for RefCell<STREAM>
where
    STREAM: StreamPeekRef<T>,
    T: Clone,
{
    fn peek_value(&self) -> T {
        self.borrow().peek_ref().clone()
    }
}

impl<STREAM, T> Stream<T> for RefCell<STREAM>
where
    STREAM: StreamPeekRef<T> + 'static,
    T: Clone + 'static,
{
}

/// Casts `Rc<dyn Stream<T>>` to `Rc<dyn Node>`.
pub trait AsNode {
    fn as_node(self: Rc<Self>) -> Rc<dyn Node>;
}

impl<NODE: Node + 'static> AsNode for NODE {
    fn as_node(self: Rc<Self>) -> Rc<dyn Node> {
        self
    }
}

/// Casts an `Rc` of a concrete stream to `Rc<dyn Stream<T>>`.
pub trait AsStream<T> {
    fn as_stream(self: Rc<Self>) -> Rc<dyn Stream<T>>;
}

impl<T, STREAM: Stream<T> + 'static> AsStream<T> for STREAM {
    fn as_stream(self: Rc<Self>) -> Rc<dyn Stream<T>> {
        self
    }
}

/// Wraps a [MutableNode] for wiring.
pub trait IntoNode {
    fn into_node(self) -> Rc<dyn Node>;
}

impl<NODE: MutableNode + 'static> IntoNode for NODE {
    fn into_node(self) -> Rc<dyn Node> {
        Rc::new(RefCell::new(self))
    }
}

/// Wraps a [StreamPeekRef] for wiring.
pub trait IntoStream<T> {
    fn into_stream(self) -> Rc<dyn Stream<T>>;
}

impl<T, STREAM> IntoStream<T> for STREAM
where
    T: Clone + 'static,
    STREAM: StreamPeekRef<T> + 'static,
{
    fn into_stream(self) -> Rc<dyn Stream<T>> {
        Rc::new(RefCell::new(self))
    }
}
