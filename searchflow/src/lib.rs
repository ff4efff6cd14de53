#![warn(clippy::perf)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_doctest_main)]

//! ## Reactive search on a stream graph
//!
//! searchflow turns keystrokes into GitHub repository search results.  The
//! keystrokes, the debounce timer, the network fetch and the rendered labels
//! are all nodes of one graph, cycled on a single thread.  A node only
//! cycles when one of its active upstreams ticked or when it asked for a
//! callback, so an idle search box costs nothing.
//!
//! The search pipeline is five stages wired with stream operators:
//!
//! ```rust
//! use searchflow::*;
//! use std::time::Duration;
//!
//! fn wire(keystrokes: std::rc::Rc<dyn Stream<String>>) -> std::rc::Rc<dyn Stream<usize>> {
//!     keystrokes
//!         .skip(1)
//!         .debounce(Duration::from_millis(300))
//!         .distinct()
//!         .switch_latest(|query: String| async move { query.len() })
//! }
//! ```
//!
//! [SearchPipeline] does this wiring against a [RepositorySearch] and binds
//! the two derived texts to [Observer]s.
//!
//! ## Historical vs RealTime
//!
//! Engine time is a [NanoTime].  [RunMode::RealTime] follows the clock and is
//! what an interactive host uses.  [RunMode::HistoricalFrom] simulates time,
//! so a scripted session of keystrokes replays instantly and
//! deterministically, which is how most of the tests here run.  In
//! historical mode asynchronous requests settle on the cycle that issued
//! them.
//!
//! ```rust
//! use searchflow::*;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let keystrokes = Rc::new(RefCell::new(CallBackStream::new()));
//! keystrokes.borrow_mut().push(ValueAt::new("r".to_string(), NanoTime::new(0)));
//! keystrokes.borrow_mut().push(ValueAt::new("rx".to_string(), NanoTime::new(100)));
//! let settled = keystrokes
//!     .clone()
//!     .as_stream()
//!     .debounce(Duration::from_nanos(300))
//!     .collect();
//! settled
//!     .run(RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Forever)
//!     .unwrap();
//! assert_eq!(settled.peek_value(), vec![ValueAt::new("rx".to_string(), NanoTime::new(400))]);
//! ```

#[macro_use]
extern crate log;
extern crate derive_new;

mod graph;
mod nodes;
mod queue;
mod search;
mod time;
mod types;

pub use graph::*;
pub use nodes::*;
pub use queue::ValueAt;
pub use search::*;
pub use time::*;
pub use types::*;
