use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.github.com";
pub const DEFAULT_USER_AGENT: &str = "searchflow";
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Settings for the search pipeline and the GitHub client.  Every field has
/// a default so a config file only needs the fields it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base url of the GitHub REST API.
    pub endpoint: String,
    /// Quiet period after the last keystroke before a query is issued.
    pub debounce_ms: u64,
    pub user_agent: String,
    /// Personal access token, raises the unauthenticated rate limit.
    pub token: Option<String>,
    pub per_page: Option<u32>,
    /// A fetch still pending after this long renders as absent.
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            token: None,
            per_page: None,
            fetch_timeout_ms: None,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Reads a json config file, then applies environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by variable name:
    ///
    /// | variable | field |
    /// |---|---|
    /// | `SEARCHFLOW_ENDPOINT` | `endpoint` |
    /// | `SEARCHFLOW_DEBOUNCE_MS` | `debounce_ms` |
    /// | `SEARCHFLOW_USER_AGENT` | `user_agent` |
    /// | `GITHUB_TOKEN` | `token` |
    /// | `SEARCHFLOW_PER_PAGE` | `per_page` |
    /// | `SEARCHFLOW_TIMEOUT_MS` | `fetch_timeout_ms` |
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        if let Some(endpoint) = lookup("SEARCHFLOW_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(debounce_ms) = parsed(&lookup, "SEARCHFLOW_DEBOUNCE_MS")? {
            self.debounce_ms = debounce_ms;
        }
        if let Some(user_agent) = lookup("SEARCHFLOW_USER_AGENT") {
            self.user_agent = user_agent;
        }
        if let Some(token) = lookup("GITHUB_TOKEN").filter(|token| !token.is_empty()) {
            self.token = Some(token);
        }
        if let Some(per_page) = parsed(&lookup, "SEARCHFLOW_PER_PAGE")? {
            self.per_page = Some(per_page);
        }
        if let Some(timeout_ms) = parsed(&lookup, "SEARCHFLOW_TIMEOUT_MS")? {
            self.fetch_timeout_ms = Some(timeout_ms);
        }
        Ok(self)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} must be a number, got {raw:?}"))
        })
        .transpose()
}
