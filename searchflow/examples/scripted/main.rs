//! Replays a scripted typing session in simulated time against a canned
//! search backend, printing every render with the engine time it happened.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use searchflow::*;

/// Pretends every keyword matches one repository per character.
struct Canned;

impl RepositorySearch for Canned {
    fn search(&self, keyword: &str) -> BoxFuture<'static, Result<SearchResult, SearchError>> {
        let repositories = keyword
            .chars()
            .enumerate()
            .map(|(i, c)| Repository {
                name: format!("{keyword}/{c}"),
                star_count: i as u64 * 100,
            })
            .collect();
        let result = SearchResult {
            repositories,
            total_count: keyword.len() as u64 * 1000,
        };
        futures::future::ready(Ok(result)).boxed()
    }
}

fn main() {
    env_logger::init();
    let script = [(0, ""), (100, "r"), (180, "ru"), (250, "rus"), (320, "rust"), (900, "rx"), (1500, "rust")];
    let keystrokes = Rc::new(RefCell::new(CallBackStream::new()));
    for (ms, text) in script {
        let time = NanoTime::from(Duration::from_millis(ms));
        keystrokes.borrow_mut().push(ValueAt::new(text.to_string(), time));
    }
    let pipeline = SearchPipeline::bind(
        keystrokes.as_stream(),
        Canned,
        |text: String| print!("{text}"),
        |text: String| println!("{text}"),
        &SearchConfig::default(),
    );
    let elapsed = pipeline
        .count_text()
        .ticked_at_elapsed()
        .for_each(|time, _| println!("-- rendered at {}", time.pretty()));
    let mut roots = pipeline.nodes();
    roots.push(elapsed);
    Graph::new(roots, RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Forever)
        .unwrap()
        .run()
        .unwrap();
}
