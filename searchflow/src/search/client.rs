use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, AUTHORIZATION};

use super::config::SearchConfig;
use super::error::SearchError;
use super::model::SearchResult;
use super::pipeline::RepositorySearch;

/// Searches repositories through the GitHub REST API.
///
/// Cheap to clone, clones share one connection pool.
#[derive(Clone, Debug)]
pub struct GithubSearch {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    per_page: Option<u32>,
}

impl GithubSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/search/repositories", config.endpoint.trim_end_matches('/')),
            token: config.token.clone(),
            per_page: config.per_page,
        })
    }

    fn request(&self, keyword: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/vnd.github+json")
            .query(&[("q", keyword)]);
        if let Some(per_page) = self.per_page {
            request = request.query(&[("per_page", per_page)]);
        }
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }
        request
    }
}

impl RepositorySearch for GithubSearch {
    fn search(&self, keyword: &str) -> BoxFuture<'static, Result<SearchResult, SearchError>> {
        let request = self.request(keyword);
        async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SearchError::Status(status.as_u16()));
            }
            let body = response.bytes().await?;
            let value: serde_json::Value = serde_json::from_slice(&body)?;
            SearchResult::try_from_value(&value)
        }
        .boxed()
    }
}
