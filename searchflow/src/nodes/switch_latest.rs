use crate::graph::{ReadyNotifier, RunMode};
use crate::types::*;

use anyhow::anyhow;
use log::Level;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A settled future, tagged with the request that issued it.
type Completion<OUT> = (u64, OUT);

/// Maps each source tick to a future and ticks with the output of the most
/// recently issued one.  A newer source tick supersedes any request still in
/// flight: its task is aborted and, should it complete anyway, its output is
/// recognised by request id and dropped.
///
/// In [RunMode::RealTime] futures run on the graph's tokio runtime and wake
/// the graph on completion.  In [RunMode::HistoricalFrom] each future is
/// driven to completion on the cycle that issued it, so it settles
/// instantly in engine time.  That fails if the graph itself runs inside a
/// tokio runtime.
///
/// The node counts as busy while its latest request is in flight, so a
/// draining graph waits for it.
///
/// Used by [switch_latest](crate::nodes::StreamOperators::switch_latest).
pub(crate) struct SwitchLatestStream<IN, OUT, FUT, FUNC>
where
    OUT: Element + Send,
    FUT: Future<Output = OUT> + Send + 'static,
    FUNC: Fn(IN) -> FUT,
{
    upstream: Rc<dyn Stream<IN>>,
    func: FUNC,
    timeout: Option<Duration>,
    value: OUT,
    request_id: u64,
    in_flight: Option<JoinHandle<()>>,
    sender: kanal::Sender<Completion<OUT>>,
    receiver: kanal::Receiver<Completion<OUT>>,
    notifier: Option<ReadyNotifier>,
}

impl<IN, OUT, FUT, FUNC> SwitchLatestStream<IN, OUT, FUT, FUNC>
where
    OUT: Element + Send,
    FUT: Future<Output = OUT> + Send + 'static,
    FUNC: Fn(IN) -> FUT,
{
    pub fn new(upstream: Rc<dyn Stream<IN>>, func: FUNC, timeout: Option<Duration>) -> Self {
        let (sender, receiver) = kanal::unbounded();
        Self {
            upstream,
            func,
            timeout,
            value: OUT::default(),
            request_id: 0,
            in_flight: None,
            sender,
            receiver,
            notifier: None,
        }
    }

    fn spawn(&mut self, state: &GraphState, fut: FUT) -> anyhow::Result<()> {
        let notifier = self
            .notifier
            .clone()
            .ok_or_else(|| anyhow!("switch_latest was not set up for RunMode::RealTime"))?;
        if let Some(previous) = self.in_flight.take() {
            if !previous.is_finished() {
                state.log(Level::Debug, &format!("superseding request {}", self.request_id - 1));
            }
            previous.abort();
        }
        let sender = self.sender.clone();
        let request_id = self.request_id;
        let timeout = self.timeout;
        let handle = state.tokio_runtime()?.spawn(async move {
            let value = settle(fut, timeout).await;
            if sender.send((request_id, value)).is_ok() && notifier.notify().is_err() {
                debug!("graph stopped before request {request_id} completed");
            }
        });
        self.in_flight = Some(handle);
        Ok(())
    }
}

/// Awaits `fut`, substituting `OUT::default()` if it does not settle in time.
async fn settle<OUT, FUT>(fut: FUT, timeout: Option<Duration>) -> OUT
where
    OUT: Default,
    FUT: Future<Output = OUT>,
{
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut).await.unwrap_or_else(|_| {
            warn!("request did not settle within {timeout:?}");
            OUT::default()
        }),
        None => fut.await,
    }
}

impl<IN, OUT, FUT, FUNC> MutableNode for SwitchLatestStream<IN, OUT, FUT, FUNC>
where
    IN: 'static,
    OUT: Element + Send,
    FUT: Future<Output = OUT> + Send + 'static,
    FUNC: Fn(IN) -> FUT,
{
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        let mut ticked = false;
        if state.ticked(self.upstream.clone().as_node()) {
            self.request_id += 1;
            let fut = (self.func)(self.upstream.peek_value());
            match state.run_mode() {
                RunMode::HistoricalFrom(_) => {
                    self.value = state.block_on(settle(fut, self.timeout))?;
                    ticked = true;
                }
                RunMode::RealTime => {
                    self.spawn(state, fut)?;
                    state.set_busy(true);
                }
            }
        }
        while let Some((request_id, value)) = self
            .receiver
            .try_recv()
            .map_err(|err| anyhow!("completion channel failed: {err:?}"))?
        {
            if request_id == self.request_id {
                self.value = value;
                ticked = true;
                state.set_busy(false);
            } else {
                state.log(Level::Debug, &format!("dropped stale result of request {request_id}"));
            }
        }
        Ok(ticked)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }

    fn setup(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        if state.run_mode() == RunMode::RealTime {
            self.notifier = Some(state.ready_notifier()?);
        }
        Ok(())
    }

    fn teardown(&mut self, _state: &mut GraphState) -> anyhow::Result<()> {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.notifier = None;
        Ok(())
    }
}

impl<IN, OUT, FUT, FUNC> StreamPeekRef<OUT> for SwitchLatestStream<IN, OUT, FUT, FUNC>
where
    IN: 'static,
    OUT: Element + Send,
    FUT: Future<Output = OUT> + Send + 'static,
    FUNC: Fn(IN) -> FUT,
{
    fn peek_ref(&self) -> &OUT {
        &self.value
    }
}
