use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SearchError;

/// One entry of a search response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    #[serde(rename = "full_name")]
    pub name: String,
    #[serde(rename = "stargazers_count")]
    pub star_count: u64,
}

impl Repository {
    /// Extracts a repository from one payload entry.  `None` when either
    /// field is missing or has the wrong type.
    pub fn from_value(entry: &Value) -> Option<Self> {
        Repository::deserialize(entry).ok()
    }
}

/// One page of search results.  `total_count` is the number of matches the
/// API reports overall and is usually larger than `repositories.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub repositories: Vec<Repository>,
    pub total_count: u64,
}

impl SearchResult {
    /// Builds a result from an untyped search response.  Requires an
    /// `items` array and an integer `total_count`, entries that are not
    /// repositories are dropped.
    pub fn try_from_value(response: &Value) -> Result<Self, SearchError> {
        let items = response
            .get("items")
            .and_then(Value::as_array)
            .ok_or(SearchError::MissingField("items"))?;
        let total_count = response
            .get("total_count")
            .and_then(Value::as_u64)
            .ok_or(SearchError::MissingField("total_count"))?;
        let repositories = items.iter().filter_map(Repository::from_value).collect();
        Ok(Self {
            repositories,
            total_count,
        })
    }

    pub fn from_value(response: &Value) -> Option<Self> {
        Self::try_from_value(response).ok()
    }
}
