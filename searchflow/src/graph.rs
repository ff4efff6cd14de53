use crate::queue::TimeQueue;
use crate::types::{NanoTime, Node};

use crossbeam::channel::{Receiver, SendError, Sender, select};
use once_cell::unsync::OnceCell;
use std::cmp::{max, min};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

static GRAPH_ID: AtomicUsize = AtomicUsize::new(0);

/// Whether the [Graph] should run RealTime or Historical mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunMode {
    RealTime,
    HistoricalFrom(NanoTime),
}

impl RunMode {
    pub fn start_time(&self) -> NanoTime {
        match self {
            RunMode::RealTime => NanoTime::now(),
            RunMode::HistoricalFrom(start_time) => *start_time,
        }
    }
}

/// Defines how long the graph should run for.  Can be a
/// Duration, number of cycles or forever.
#[derive(Clone, Copy, Debug)]
pub enum RunFor {
    Duration(Duration),
    Cycles(u32),
    Forever,
}

/// Produced by [GraphState] and handed to code running off the graph
/// thread (tokio tasks, input handles).  Notifying marks the bound node
/// dirty on the next engine cycle.  Only meaningful in [RunMode::RealTime].
#[derive(Clone, Debug)]
pub struct ReadyNotifier {
    node_index: usize,
    sender: Sender<usize>,
}

impl ReadyNotifier {
    pub fn notify(&self) -> Result<(), SendError<usize>> {
        self.sender.send(self.node_index)
    }
}

/// Identifies a node by the address of its allocation.  Every wired node is
/// held by its slot, so an address is never reused mid-run.
fn node_key(node: &Rc<dyn Node>) -> usize {
    Rc::as_ptr(node) as *const () as usize
}

/// A wired node.  `downstreams` only lists nodes that wired this one as an
/// active upstream.
struct Slot {
    node: Rc<dyn Node>,
    layer: usize,
    downstreams: Vec<usize>,
    dirty: bool,
    ticked: bool,
    busy: bool,
}

/// Maintains the parts of the graph state that is accessible to Nodes.
pub struct GraphState {
    id: usize,
    time: NanoTime,
    start_time: NanoTime,
    run_mode: RunMode,
    run_time: OnceCell<Arc<tokio::runtime::Runtime>>,
    current: Option<usize>,
    callbacks: TimeQueue<usize>,
    ready_sender: Sender<usize>,
    ready_receiver: Receiver<usize>,
    result: Option<anyhow::Result<()>>,
    draining: bool,
    index_of: HashMap<usize, usize>,
    slots: Vec<Slot>,
    dirty_by_layer: Vec<Vec<usize>>,
}

impl GraphState {
    fn new(run_mode: RunMode) -> Self {
        let (ready_sender, ready_receiver) = crossbeam::channel::unbounded();
        Self {
            id: GRAPH_ID.fetch_add(1, Ordering::SeqCst),
            time: NanoTime::ZERO,
            start_time: NanoTime::ZERO,
            run_mode,
            run_time: OnceCell::new(),
            current: None,
            callbacks: TimeQueue::new(),
            ready_sender,
            ready_receiver,
            result: None,
            draining: false,
            index_of: HashMap::new(),
            slots: Vec::new(),
            dirty_by_layer: Vec::new(),
        }
    }

    /// The current engine time
    pub fn time(&self) -> NanoTime {
        self.time
    }

    /// Engine time elapsed since the start of the run
    pub fn elapsed(&self) -> NanoTime {
        self.time.saturating_sub(self.start_time)
    }

    pub fn start_time(&self) -> NanoTime {
        self.start_time
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// A notifier bound to the node currently being set up or cycled.
    pub fn ready_notifier(&self) -> anyhow::Result<ReadyNotifier> {
        let node_index = self
            .current
            .ok_or_else(|| anyhow::anyhow!("ready_notifier requested outside of a node"))?;
        Ok(ReadyNotifier {
            node_index,
            sender: self.ready_sender.clone(),
        })
    }

    /// The runtime async nodes spawn onto.  Built on first use, so graphs
    /// without async nodes never start one.
    pub fn tokio_runtime(&self) -> anyhow::Result<Arc<tokio::runtime::Runtime>> {
        let run_time = self.run_time.get_or_try_init(|| {
            debug!("graph {:?}, starting tokio runtime", self.id);
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("searchflow-io")
                .enable_all()
                .build()
                .map(Arc::new)
        })?;
        Ok(run_time.clone())
    }

    /// Drives `fut` to completion on the graph's runtime.  Fails if the
    /// graph itself is running inside a tokio runtime, where blocking would
    /// panic.
    pub fn block_on<F: Future>(&self, fut: F) -> anyhow::Result<F::Output> {
        if tokio::runtime::Handle::try_current().is_ok() {
            anyhow::bail!("cannot block on a future inside a tokio runtime, run the graph on a plain thread");
        }
        Ok(self.tokio_runtime()?.block_on(fut))
    }

    /// Requests that the current node is cycled at `time`.
    pub fn add_callback(&mut self, time: NanoTime) {
        if let Some(ix) = self.current {
            self.callbacks.push(ix, time);
        }
    }

    /// Returns true if node has ticked on the current engine cycle
    pub fn ticked(&self, node: Rc<dyn Node>) -> bool {
        self.index_of
            .get(&node_key(&node))
            .is_some_and(|ix| self.slots[*ix].ticked)
    }

    /// Ends the run after the current cycle with the supplied result.
    pub fn terminate(&mut self, result: anyhow::Result<()>) {
        self.result = Some(result)
    }

    /// Ends the run once the graph is idle: no callback is scheduled and no
    /// node is busy.
    pub fn drain(&mut self) {
        self.draining = true;
    }

    /// Flags the current node as waiting on work off the graph thread.  A
    /// draining graph keeps running until the flag is cleared.
    pub fn set_busy(&mut self, busy: bool) {
        if let Some(ix) = self.current {
            self.slots[ix].busy = busy;
        }
    }

    fn is_idle(&self) -> bool {
        self.callbacks.next_time().is_none() && !self.slots.iter().any(|slot| slot.busy)
    }

    /// Logs against the node currently being cycled, using its type as target.
    pub fn log(&self, level: log::Level, msg: &str) {
        if !log_enabled!(level) {
            return;
        }
        if let Some(ix) = self.current {
            let id = self.id;
            let type_name = self.slots[ix].node.type_name();
            log!(target: type_name.as_str(), level, "[{id:},{ix:}]{msg:}");
        }
    }

    fn mark_dirty(&mut self, ix: usize) {
        let slot = &mut self.slots[ix];
        if !slot.dirty {
            slot.dirty = true;
            self.dirty_by_layer[slot.layer].push(ix);
        }
    }

    /// Marks every node whose callback is due.
    fn wake_due(&mut self) -> bool {
        let mut woke = false;
        while let Some(ix) = self.callbacks.pop_due(self.time) {
            self.mark_dirty(ix);
            woke = true;
        }
        woke
    }

    /// Marks every node notified from another thread.
    fn wake_ready(&mut self) -> bool {
        let mut woke = false;
        while let Ok(ix) = self.ready_receiver.try_recv() {
            self.mark_dirty(ix);
            woke = true;
        }
        woke
    }

    /// Blocks until a notification arrives or `until` passes.
    fn wait_ready(&mut self, until: NanoTime) -> Option<usize> {
        let now = NanoTime::now();
        if now > until {
            return None;
        }
        let timeout = Duration::from(until - now);
        select! {
            recv(self.ready_receiver) -> msg => msg.ok(),
            default(timeout) => None,
        }
    }

    fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.dirty = false;
            slot.ticked = false;
        }
        for layer in self.dirty_by_layer.iter_mut() {
            layer.clear();
        }
    }
}

/// Engine for co-ordinating execution of [Node]s.
///
/// Nodes are wired from the supplied roots, upstreams first, and assigned
/// a layer one deeper than their deepest upstream.  Each engine cycle walks
/// the dirty nodes layer by layer, so a node always sees its upstreams'
/// values for the current cycle.
pub struct Graph {
    state: GraphState,
    run_for: RunFor,
}

impl Graph {
    pub fn new(root_nodes: Vec<Rc<dyn Node>>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<Graph> {
        let mut graph = Graph {
            state: GraphState::new(run_mode),
            run_for,
        };
        let timer = Instant::now();
        for node in &root_nodes {
            graph.wire(node);
        }
        debug!(
            "graph {:?}, {:} nodes wired in {:?}",
            graph.state.id,
            graph.node_count(),
            timer.elapsed()
        );
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.state.slots.len()
    }

    /// Sets up, starts and runs the graph to completion.  Nodes are always
    /// stopped and torn down, even when a cycle fails.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let start_time = self.state.run_mode.start_time();
        self.state.start_time = start_time;
        self.state.time = start_time;
        let result = self
            .apply_nodes("setup", |node, state| node.setup(state))
            .and_then(|_| self.apply_nodes("start", |node, state| node.start(state)))
            .and_then(|_| self.run_nodes());
        let stopped = self.apply_nodes("stop", |node, state| node.stop(state));
        let torn_down = self.apply_nodes("teardown", |node, state| node.teardown(state));
        result.and(stopped).and(torn_down)
    }

    // recursively crawls the graph defined by node,
    // upstreams are always wired before their downstreams
    fn wire(&mut self, node: &Rc<dyn Node>) -> usize {
        if let Some(ix) = self.state.index_of.get(&node_key(node)) {
            return *ix;
        }
        let upstreams = node.upstreams();
        let mut layer = 0;
        let mut active = Vec::with_capacity(upstreams.active.len());
        for upstream in &upstreams.active {
            let up = self.wire(upstream);
            layer = max(layer, self.state.slots[up].layer + 1);
            active.push(up);
        }
        for upstream in &upstreams.passive {
            let up = self.wire(upstream);
            layer = max(layer, self.state.slots[up].layer + 1);
        }
        let ix = self.state.slots.len();
        self.state.index_of.insert(node_key(node), ix);
        self.state.slots.push(Slot {
            node: node.clone(),
            layer,
            downstreams: Vec::new(),
            dirty: false,
            ticked: false,
            busy: false,
        });
        for up in active {
            self.state.slots[up].downstreams.push(ix);
        }
        if self.state.dirty_by_layer.len() <= layer {
            self.state.dirty_by_layer.resize_with(layer + 1, Vec::new);
        }
        ix
    }

    fn apply_nodes(
        &mut self,
        desc: &str,
        func: impl Fn(Rc<dyn Node>, &mut GraphState) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let mut result = Ok(());
        for ix in 0..self.state.slots.len() {
            let node = self.state.slots[ix].node.clone();
            self.state.current = Some(ix);
            let res = func(node, &mut self.state);
            self.state.current = None;
            if let Err(err) = res {
                error!("graph {:?}, {desc} failed on node [{ix}]: {err:#}", self.state.id);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    fn run_nodes(&mut self) -> anyhow::Result<()> {
        let timer = Instant::now();
        let (end_time, max_cycles) = match self.run_for {
            RunFor::Duration(duration) => (self.state.start_time + duration, u32::MAX),
            RunFor::Cycles(cycles) => (NanoTime::MAX, cycles),
            RunFor::Forever => (NanoTime::MAX, u32::MAX),
        };
        let mut cycles: u32 = 0;
        while cycles < max_cycles && self.state.time < end_time {
            if let Some(result) = self.state.result.take() {
                return result;
            }
            if self.state.draining && self.state.is_idle() {
                debug!("graph {:?}, drained", self.state.id);
                break;
            }
            let woke = match self.state.run_mode {
                RunMode::RealTime => self.wake_realtime(end_time),
                RunMode::HistoricalFrom(_) => self.wake_historical(end_time)?,
            };
            if !woke {
                if self.state.run_mode == RunMode::RealTime {
                    continue;
                }
                debug!("graph {:?}, nothing left to do", self.state.id);
                break;
            }
            if self.state.time > end_time {
                break;
            }
            self.cycle()?;
            cycles += 1;
        }
        debug!(
            "graph {:?}, {cycles} cycles in {:?}",
            self.state.id,
            timer.elapsed()
        );
        self.state.result.take().unwrap_or(Ok(()))
    }

    /// Jumps engine time to the next callback.
    fn wake_historical(&mut self, end_time: NanoTime) -> anyhow::Result<bool> {
        if !self.state.ready_receiver.is_empty() {
            anyhow::bail!("ready callbacks are only supported in RunMode::RealTime");
        }
        match self.state.callbacks.next_time() {
            Some(next) if next <= end_time => {
                self.state.time = max(self.state.time, next);
                Ok(self.state.wake_due())
            }
            _ => Ok(false),
        }
    }

    /// Follows the clock, sleeping until the next callback, the end of the
    /// run or a notification, whichever comes first.
    fn wake_realtime(&mut self, end_time: NanoTime) -> bool {
        self.state.time = NanoTime::now();
        let mut woke = self.state.wake_ready() | self.state.wake_due();
        if !woke {
            let until = min(end_time, self.state.callbacks.next_time().unwrap_or(NanoTime::MAX));
            if let Some(ix) = self.state.wait_ready(until) {
                self.state.mark_dirty(ix);
                woke = true;
            }
            self.state.time = NanoTime::now();
            woke |= self.state.wake_due();
        }
        woke
    }

    fn cycle(&mut self) -> anyhow::Result<()> {
        let mut result = Ok(());
        // ticks only ever dirty deeper layers
        'layers: for layer in 0..self.state.dirty_by_layer.len() {
            let dirty = std::mem::take(&mut self.state.dirty_by_layer[layer]);
            for ix in dirty {
                if let Err(err) = self.cycle_node(ix) {
                    result = Err(err);
                    break 'layers;
                }
            }
        }
        self.state.reset();
        result
    }

    fn cycle_node(&mut self, ix: usize) -> anyhow::Result<()> {
        let node = self.state.slots[ix].node.clone();
        self.state.current = Some(ix);
        let ticked = node.cycle(&mut self.state);
        self.state.current = None;
        if ticked? {
            self.state.slots[ix].ticked = true;
            for i in 0..self.state.slots[ix].downstreams.len() {
                let downstream = self.state.slots[ix].downstreams[i];
                self.state.mark_dirty(downstream);
            }
        }
        Ok(())
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        // dropping a runtime blocks, which tokio forbids inside async code
        if let Some(run_time) = self.state.run_time.take().and_then(|rt| Arc::try_unwrap(rt).ok()) {
            run_time.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {

    use crate::graph::*;
    use crate::nodes::*;
    use crate::queue::ValueAt;
    use crate::types::*;
    use std::cell::RefCell;

    #[test]
    fn historical_mode_cycles_in_time_order() {
        let input: Rc<RefCell<CallBackStream<String>>> = Rc::new(RefCell::new(CallBackStream::new()));
        input.borrow_mut().push(ValueAt::new("b".to_string(), NanoTime::new(200)));
        input.borrow_mut().push(ValueAt::new("a".to_string(), NanoTime::new(100)));
        let captured = input.clone().as_stream().collect();
        captured
            .run(RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Forever)
            .unwrap();
        let expected = vec![
            ValueAt::new("a".to_string(), NanoTime::new(100)),
            ValueAt::new("b".to_string(), NanoTime::new(200)),
        ];
        assert_eq!(expected, captured.peek_value());
    }

    #[test]
    fn shared_upstream_is_wired_once() {
        let input: Rc<RefCell<CallBackStream<u32>>> = Rc::new(RefCell::new(CallBackStream::new()));
        let doubled = input.clone().as_stream().map(|x| x * 2);
        let a = doubled.map(|x| x + 1);
        let b = doubled.map(|x| x + 2);
        let graph = Graph::new(
            vec![a.as_node(), b.as_node()],
            RunMode::HistoricalFrom(NanoTime::ZERO),
            RunFor::Forever,
        )
        .unwrap();
        // input, doubled, a, b
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn diamond_sees_both_branches_in_one_cycle() {
        let input: Rc<RefCell<CallBackStream<u32>>> = Rc::new(RefCell::new(CallBackStream::new()));
        input.borrow_mut().push(ValueAt::new(1, NanoTime::new(100)));
        input.borrow_mut().push(ValueAt::new(2, NanoTime::new(200)));
        let source = input.clone().as_stream();
        let summed = bimap(source.map(|x| x * 10), source.map(|x| x * 100), |a, b| a + b).collect();
        summed
            .run(RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Forever)
            .unwrap();
        let values: Vec<u32> = summed.peek_value().into_iter().map(|v| v.value).collect();
        assert_eq!(values, vec![110, 220]);
    }

    #[test]
    fn duration_bounds_historical_run() {
        let input: Rc<RefCell<CallBackStream<u32>>> = Rc::new(RefCell::new(CallBackStream::new()));
        for i in 1..=5 {
            input.borrow_mut().push(ValueAt::new(i, NanoTime::new(i as u64 * 100)));
        }
        let captured = input.clone().as_stream().collect();
        captured
            .run(
                RunMode::HistoricalFrom(NanoTime::ZERO),
                RunFor::Duration(Duration::from_nanos(300)),
            )
            .unwrap();
        let values: Vec<u32> = captured.peek_value().into_iter().map(|v| v.value).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn cycles_bound_historical_run() {
        let input: Rc<RefCell<CallBackStream<u32>>> = Rc::new(RefCell::new(CallBackStream::new()));
        for i in 1..=5 {
            input.borrow_mut().push(ValueAt::new(i, NanoTime::new(i as u64 * 100)));
        }
        let captured = input.clone().as_stream().collect();
        captured
            .run(RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Cycles(2))
            .unwrap();
        assert_eq!(captured.peek_value().len(), 2);
    }

    #[test]
    fn historical_graph_without_async_nodes_starts_no_runtime() {
        let input: Rc<RefCell<CallBackStream<u32>>> = Rc::new(RefCell::new(CallBackStream::new()));
        input.borrow_mut().push(ValueAt::new(1, NanoTime::new(100)));
        let captured = input.clone().as_stream().collect();
        let mut graph = Graph::new(
            vec![captured.clone().as_node()],
            RunMode::HistoricalFrom(NanoTime::ZERO),
            RunFor::Forever,
        )
        .unwrap();
        graph.run().unwrap();
        assert_eq!(captured.peek_value().len(), 1);
        assert!(graph.state.run_time.get().is_none());
    }

    /// Asks the graph to drain on its first cycle, then stays busy until a
    /// background thread reports back.
    #[derive(Default)]
    struct Worker {
        cycles: Rc<RefCell<u32>>,
        notifier: Option<ReadyNotifier>,
    }

    impl MutableNode for Worker {
        fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
            *self.cycles.borrow_mut() += 1;
            if *self.cycles.borrow() == 1 {
                state.set_busy(true);
                state.drain();
                let notifier = self.notifier.clone().unwrap();
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(50));
                    let _ = notifier.notify();
                });
            } else {
                state.set_busy(false);
            }
            Ok(true)
        }

        fn setup(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
            self.notifier = Some(state.ready_notifier()?);
            Ok(())
        }

        fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
            state.add_callback(state.start_time());
            Ok(())
        }
    }

    #[test]
    fn draining_waits_for_busy_nodes() {
        let cycles = Rc::new(RefCell::new(0));
        let worker = Worker {
            cycles: cycles.clone(),
            ..Worker::default()
        };
        let timer = Instant::now();
        Graph::new(
            vec![worker.into_node()],
            RunMode::RealTime,
            RunFor::Duration(Duration::from_secs(5)),
        )
        .unwrap()
        .run()
        .unwrap();
        assert_eq!(*cycles.borrow(), 2);
        assert!(timer.elapsed() < Duration::from_secs(2));
    }

    /// Ticks every 100ns forever unless told to stop.
    struct Ticker {
        stop_at: NanoTime,
    }

    impl MutableNode for Ticker {
        fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
            if state.time() >= self.stop_at {
                state.terminate(Ok(()));
            }
            state.add_callback(state.time() + 100_u64);
            Ok(true)
        }

        fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
            state.add_callback(state.start_time());
            Ok(())
        }
    }

    #[test]
    fn terminate_ends_run_after_the_cycle() {
        let mut graph = Graph::new(
            vec![Ticker { stop_at: NanoTime::new(300) }.into_node()],
            RunMode::HistoricalFrom(NanoTime::ZERO),
            RunFor::Forever,
        )
        .unwrap();
        graph.run().unwrap();
        assert_eq!(graph.state.time(), NanoTime::new(300));
    }

    #[test]
    fn failing_node_terminates_run() {
        let input: Rc<RefCell<CallBackStream<u32>>> = Rc::new(RefCell::new(CallBackStream::new()));
        input.borrow_mut().push(ValueAt::new(1, NanoTime::new(100)));
        let result = input
            .clone()
            .as_stream()
            .try_for_each(|_, _| anyhow::bail!("boom"))
            .run(RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Forever);
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
