//! GitHub repository search wired as a stream pipeline.

mod config;
mod error;
mod model;
mod pipeline;
mod render;

#[cfg(feature = "github")]
mod client;

#[cfg(feature = "github")]
pub use client::GithubSearch;
pub use config::SearchConfig;
pub use error::SearchError;
pub use model::{Repository, SearchResult};
pub use pipeline::{RepositorySearch, SearchPipeline};
pub use render::*;
