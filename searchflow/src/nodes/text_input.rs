use crate::graph::{ReadyNotifier, RunMode};
use crate::types::*;

use anyhow::anyhow;
use once_cell::sync::OnceCell;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug)]
enum InputEvent {
    Text(String),
    Close,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("the graph reading this input has shut down")]
    Disconnected,
}

/// The writing end of a [text_input].  Cheap to clone and safe to move to
/// other threads, e.g. a UI event loop or a stdin reader.
#[derive(Clone)]
pub struct TextInputHandle {
    sender: kanal::Sender<InputEvent>,
    notifier: Arc<OnceCell<ReadyNotifier>>,
}

impl std::fmt::Debug for TextInputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextInputHandle")
            .field("bound", &self.notifier.get().is_some())
            .finish()
    }
}

impl TextInputHandle {
    /// Replaces the current text.  Call once per keystroke.
    pub fn set_text(&self, text: impl Into<String>) -> Result<(), InputError> {
        self.send(InputEvent::Text(text.into()))
    }

    /// Ends the run once the graph has drained everything sent before:
    /// pending debounce windows expire and in-flight requests settle.
    /// Text sent afterwards is ignored.
    pub fn close(&self) -> Result<(), InputError> {
        self.send(InputEvent::Close)
    }

    fn send(&self, event: InputEvent) -> Result<(), InputError> {
        self.sender.send(event).map_err(|_| InputError::Disconnected)?;
        // not yet set up, the first cycle drains anything queued
        if let Some(notifier) = self.notifier.get() {
            notifier.notify().map_err(|_| InputError::Disconnected)?;
        }
        Ok(())
    }
}

/// A live text field.  Ticks `initial` on the first cycle, then once per
/// cycle in which new text arrived, with the latest text.  Only supported in
/// [RunMode::RealTime].
pub(crate) struct TextInputStream {
    receiver: kanal::Receiver<InputEvent>,
    notifier: Arc<OnceCell<ReadyNotifier>>,
    value: String,
    started: bool,
    closed: bool,
}

impl MutableNode for TextInputStream {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        if !self.started {
            // the initial text gets a cycle of its own
            self.started = true;
            if !self.receiver.is_empty() {
                state.add_callback(state.time() + 1_u64);
            }
            return Ok(true);
        }
        let mut ticked = false;
        while let Some(event) = self
            .receiver
            .try_recv()
            .map_err(|err| anyhow!("text input channel failed: {err:?}"))?
        {
            match event {
                _ if self.closed => {}
                InputEvent::Text(text) => {
                    self.value = text;
                    ticked = true;
                }
                InputEvent::Close => {
                    state.log(log::Level::Debug, "input closed, draining");
                    self.closed = true;
                    state.drain();
                }
            }
        }
        Ok(ticked)
    }

    fn setup(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        if state.run_mode() != RunMode::RealTime {
            anyhow::bail!("text_input only supports RunMode::RealTime");
        }
        self.notifier
            .set(state.ready_notifier()?)
            .map_err(|_| anyhow!("text_input can only be wired into one graph"))
    }

    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        state.add_callback(state.start_time());
        Ok(())
    }
}

impl StreamPeekRef<String> for TextInputStream {
    fn peek_ref(&self) -> &String {
        &self.value
    }
}

/// Creates a live text source and the handle used to type into it.
pub fn text_input(initial: &str) -> (TextInputHandle, Rc<dyn Stream<String>>) {
    let (sender, receiver) = kanal::unbounded();
    let notifier = Arc::new(OnceCell::new());
    let handle = TextInputHandle {
        sender,
        notifier: notifier.clone(),
    };
    let stream = TextInputStream {
        receiver,
        notifier,
        value: initial.to_string(),
        started: false,
        closed: false,
    };
    (handle, stream.into_stream())
}
