use futures::future::BoxFuture;
use log::Level;
use std::rc::Rc;

use super::config::SearchConfig;
use super::error::SearchError;
use super::model::SearchResult;
use super::render::{INITIAL_COUNT_TEXT, count_text, repository_text};
use crate::graph::{Graph, RunFor, RunMode};
use crate::nodes::StreamOperators;
use crate::types::*;

/// Something that can look up repositories by keyword.  The returned future
/// runs on the graph's tokio runtime, so it must own everything it uses.
pub trait RepositorySearch {
    fn search(&self, keyword: &str) -> BoxFuture<'static, Result<SearchResult, SearchError>>;
}

/// Keystrokes in, rendered search results out.
///
/// The query source is skipped once (its initial value), debounced,
/// de-duplicated and then searched.  Only the newest search is ever
/// rendered, older ones are aborted.  A failed search renders as absent and
/// the pipeline carries on with the next query.
///
/// All consumers share one result stream, so each query is searched once no
/// matter how many consumers are wired to [results](SearchPipeline::results).
pub struct SearchPipeline {
    results: Rc<dyn Stream<Option<Rc<SearchResult>>>>,
    repository_text: Rc<dyn Stream<String>>,
    count_text: Rc<dyn Stream<String>>,
    nodes: Vec<Rc<dyn Node>>,
}

impl SearchPipeline {
    /// Wires `queries` through `search` and binds the rendered texts to the
    /// two sinks.  Nothing happens until the returned pipeline is run.
    pub fn bind(
        queries: Rc<dyn Stream<String>>,
        search: impl RepositorySearch + 'static,
        repository_sink: impl Observer<String> + 'static,
        count_sink: impl Observer<String> + 'static,
        config: &SearchConfig,
    ) -> Self {
        let fetch = move |query: String| {
            let request = search.search(&query);
            async move {
                match request.await {
                    Ok(result) => Some(result),
                    Err(err) => {
                        warn!("search for {query:?} failed: {err}");
                        None
                    }
                }
            }
        };
        let settled = queries
            .skip(1)
            .debounce(config.debounce())
            .distinct()
            .logged("query", Level::Debug);
        let settled = match config.fetch_timeout() {
            Some(timeout) => settled.switch_latest_with_timeout(fetch, timeout),
            None => settled.switch_latest(fetch),
        };
        let results = settled.map(|result| result.map(Rc::new));
        let repository_text = results.map(|result| repository_text(result.as_deref()));
        let count_text = results
            .map(|result| count_text(result.as_deref()))
            .start_with(INITIAL_COUNT_TEXT.to_string());
        let nodes = vec![
            repository_text.bind(repository_sink),
            count_text.bind(count_sink),
        ];
        Self {
            results,
            repository_text,
            count_text,
            nodes,
        }
    }

    /// The shared result stream.  `None` is the absent result.
    pub fn results(&self) -> Rc<dyn Stream<Option<Rc<SearchResult>>>> {
        self.results.clone()
    }

    /// The most recent result, as seen by a consumer wired now.
    pub fn latest(&self) -> Option<Rc<SearchResult>> {
        self.results.peek_value()
    }

    pub fn repository_text(&self) -> Rc<dyn Stream<String>> {
        self.repository_text.clone()
    }

    pub fn count_text(&self) -> Rc<dyn Stream<String>> {
        self.count_text.clone()
    }

    /// The sink nodes, i.e. the roots to build a [Graph] from.
    pub fn nodes(&self) -> Vec<Rc<dyn Node>> {
        self.nodes.clone()
    }

    pub fn into_graph(&self, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<Graph> {
        Graph::new(self.nodes(), run_mode, run_for)
    }

    pub fn run(&self, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<()> {
        self.into_graph(run_mode, run_for)?.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::*;
    use crate::queue::ValueAt;
    use crate::search::Repository;
    use futures::FutureExt;
    use std::cell::RefCell;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Label {
        writes: Rc<RefCell<Vec<String>>>,
    }

    impl Observer<String> for Label {
        fn on_value(&self, value: String) {
            self.writes.borrow_mut().push(value);
        }
    }

    impl Label {
        fn writes(&self) -> Vec<String> {
            self.writes.borrow().clone()
        }
    }

    /// Answers `<keyword>/repo` with `len(keyword)` stars after a short
    /// delay.  Keywords starting with "slow" take much longer and keywords
    /// containing "fail" fail.
    #[derive(Clone, Default)]
    struct MockSearch {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockSearch {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RepositorySearch for MockSearch {
        fn search(&self, keyword: &str) -> BoxFuture<'static, Result<SearchResult, SearchError>> {
            self.calls.lock().unwrap().push(keyword.to_string());
            let keyword = keyword.to_string();
            async move {
                let delay = if keyword.starts_with("slow") { 300 } else { 20 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                if keyword.contains("fail") {
                    return Err(SearchError::Status(503));
                }
                Ok(SearchResult {
                    repositories: vec![Repository {
                        name: format!("{keyword}/repo"),
                        star_count: keyword.len() as u64,
                    }],
                    total_count: keyword.len() as u64 * 10,
                })
            }
            .boxed()
        }
    }

    struct Session {
        repos: Vec<String>,
        counts: Vec<String>,
        calls: Vec<String>,
    }

    fn config(debounce_ms: u64) -> SearchConfig {
        SearchConfig {
            debounce_ms,
            ..SearchConfig::default()
        }
    }

    fn keystrokes(typed: &[(u64, &str)]) -> Rc<dyn Stream<String>> {
        let input: Rc<RefCell<CallBackStream<String>>> = Rc::new(RefCell::new(CallBackStream::new()));
        for (offset, text) in typed {
            input
                .borrow_mut()
                .push_after(Duration::from_millis(*offset), text.to_string());
        }
        input.as_stream()
    }

    fn run_session(typed: &[(u64, &str)], config: SearchConfig, run_ms: u64) -> Session {
        let _ = env_logger::try_init();
        let search = MockSearch::default();
        let repos = Label::default();
        let counts = Label::default();
        let pipeline = SearchPipeline::bind(keystrokes(typed), search.clone(), repos.clone(), counts.clone(), &config);
        pipeline
            .run(RunMode::RealTime, RunFor::Duration(Duration::from_millis(run_ms)))
            .unwrap();
        Session {
            repos: repos.writes(),
            counts: counts.writes(),
            calls: search.calls(),
        }
    }

    #[test]
    fn burst_of_keystrokes_searches_once() {
        let session = run_session(&[(0, ""), (10, "r"), (40, "rx"), (70, "rxs")], config(100), 500);
        assert_eq!(session.calls, vec!["rxs"]);
        assert_eq!(session.repos, vec!["rxs/repo(3)\n"]);
        assert_eq!(session.counts, vec![INITIAL_COUNT_TEXT, "TotalCount: 30"]);
    }

    #[test]
    fn returning_to_the_same_query_does_not_search_again() {
        let session = run_session(&[(0, ""), (10, "rx"), (200, "rxs"), (220, "rx")], config(100), 600);
        assert_eq!(session.calls, vec!["rx"]);
        assert_eq!(session.repos, vec!["rx/repo(2)\n"]);
    }

    #[test]
    fn superseded_search_is_never_rendered() {
        // "slow" is issued first and completes after "fast"
        let session = run_session(&[(0, ""), (10, "slow"), (150, "fast")], config(50), 700);
        assert_eq!(session.calls, vec!["slow", "fast"]);
        assert_eq!(session.repos, vec!["fast/repo(4)\n"]);
        assert_eq!(session.counts, vec![INITIAL_COUNT_TEXT, "TotalCount: 40"]);
    }

    #[test]
    fn failed_search_renders_absent_then_recovers() {
        let session = run_session(&[(0, ""), (10, "fail"), (200, "rust")], config(50), 600);
        assert_eq!(session.calls, vec!["fail", "rust"]);
        assert_eq!(session.repos, vec!["", "rust/repo(4)\n"]);
        assert_eq!(
            session.counts,
            vec![INITIAL_COUNT_TEXT, "TotalCount: nil", "TotalCount: 40"]
        );
    }

    #[test]
    fn stalled_search_times_out_as_absent() {
        let config = SearchConfig {
            debounce_ms: 50,
            fetch_timeout_ms: Some(100),
            ..SearchConfig::default()
        };
        let session = run_session(&[(0, ""), (10, "slow")], config, 600);
        assert_eq!(session.calls, vec!["slow"]);
        assert_eq!(session.repos, vec![""]);
        assert_eq!(session.counts, vec![INITIAL_COUNT_TEXT, "TotalCount: nil"]);
    }

    #[test]
    fn oversized_debounce_from_env_never_fires() {
        let config = SearchConfig::default()
            .with_overrides(|key: &str| (key == "SEARCHFLOW_DEBOUNCE_MS").then(|| u64::MAX.to_string()))
            .unwrap();
        let session = run_session(&[(0, ""), (10, "rx")], config, 200);
        assert!(session.calls.is_empty());
        assert_eq!(session.counts, vec![INITIAL_COUNT_TEXT]);
    }

    #[test]
    fn closing_the_input_waits_for_the_last_search() {
        let _ = env_logger::try_init();
        let (handle, queries) = text_input("");
        let search = MockSearch::default();
        let repos = Label::default();
        let counts = Label::default();
        let pipeline = SearchPipeline::bind(queries, search.clone(), repos.clone(), counts.clone(), &config(50));
        // the query is still inside the debounce window, and its search is slow
        handle.set_text("slow").unwrap();
        handle.close().unwrap();
        let timer = std::time::Instant::now();
        pipeline
            .run(RunMode::RealTime, RunFor::Duration(Duration::from_secs(5)))
            .unwrap();
        assert!(timer.elapsed() < Duration::from_secs(2));
        assert_eq!(search.calls(), vec!["slow"]);
        assert_eq!(repos.writes(), vec!["slow/repo(4)\n"]);
        assert_eq!(counts.writes(), vec![INITIAL_COUNT_TEXT, "TotalCount: 40"]);
    }

    #[test]
    fn placeholder_is_shown_before_any_query() {
        let session = run_session(&[(0, "")], config(50), 200);
        assert!(session.calls.is_empty());
        assert!(session.repos.is_empty());
        assert_eq!(session.counts, vec![INITIAL_COUNT_TEXT]);
    }

    #[test]
    fn texts_are_empty_before_the_run() {
        let pipeline = SearchPipeline::bind(
            keystrokes(&[]),
            MockSearch::default(),
            Label::default(),
            Label::default(),
            &config(50),
        );
        assert_eq!(pipeline.repository_text().peek_value(), "");
        assert_eq!(pipeline.count_text().peek_value(), INITIAL_COUNT_TEXT);
        assert!(pipeline.latest().is_none());
    }

    #[test]
    fn consumers_share_one_search_per_query() {
        let _ = env_logger::try_init();
        let search = MockSearch::default();
        let pipeline = SearchPipeline::bind(
            keystrokes(&[(0, ""), (10, "rx"), (200, "rust")]),
            search.clone(),
            Label::default(),
            Label::default(),
            &config(50),
        );
        let first = pipeline.results().collect();
        let second = pipeline.results().map(|result| result.map(|r| r.total_count)).collect();
        let mut roots = pipeline.nodes();
        roots.push(first.clone().as_node());
        roots.push(second.clone().as_node());
        Graph::new(roots, RunMode::RealTime, RunFor::Duration(Duration::from_millis(500)))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(search.calls(), vec!["rx", "rust"]);
        let first: Vec<Option<u64>> = first
            .peek_value()
            .into_iter()
            .map(|v| v.value.map(|r| r.total_count))
            .collect();
        let second: Vec<Option<u64>> = second.peek_value().into_iter().map(|v| v.value).collect();
        assert_eq!(first, vec![Some(20), Some(40)]);
        assert_eq!(first, second);
        assert_eq!(pipeline.latest().map(|r| r.total_count), Some(40));
    }

    /// Serves one canned json response without touching the network.
    struct CannedSearch(serde_json::Value);

    impl RepositorySearch for CannedSearch {
        fn search(&self, _keyword: &str) -> BoxFuture<'static, Result<SearchResult, SearchError>> {
            futures::future::ready(SearchResult::try_from_value(&self.0)).boxed()
        }
    }

    #[test]
    fn historical_session_renders_payload() {
        let input: Rc<RefCell<CallBackStream<String>>> = Rc::new(RefCell::new(CallBackStream::new()));
        let ms = |ms: u64| NanoTime::from(Duration::from_millis(ms));
        input.borrow_mut().push(ValueAt::new(String::new(), ms(0)));
        input.borrow_mut().push(ValueAt::new("x".to_string(), ms(100)));
        input.borrow_mut().push(ValueAt::new("x/".to_string(), ms(200)));
        let payload = serde_json::json!({
            "total_count": 2,
            "items": [{"full_name": "x/y", "stargazers_count": 5}]
        });
        let repos = Label::default();
        let counts = Label::default();
        let pipeline = SearchPipeline::bind(
            input.as_stream(),
            CannedSearch(payload),
            repos.clone(),
            counts.clone(),
            &config(300),
        );
        let rendered = pipeline.repository_text().collect();
        let mut roots = pipeline.nodes();
        roots.push(rendered.clone().as_node());
        Graph::new(roots, RunMode::HistoricalFrom(NanoTime::ZERO), RunFor::Forever)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(
            rendered.peek_value(),
            vec![ValueAt::new("x/y(5)\n".to_string(), ms(500))]
        );
        assert_eq!(counts.writes(), vec![INITIAL_COUNT_TEXT, "TotalCount: 2"]);
    }
}
