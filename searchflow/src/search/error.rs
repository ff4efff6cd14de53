use thiserror::Error;

/// Why a search produced no result.  The pipeline never surfaces these to
/// the renderer, they are logged and replaced by the absent result.
#[derive(Debug, Error)]
pub enum SearchError {
    #[cfg(feature = "github")]
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search endpoint answered with status {0}")]
    Status(u16),
    #[error("response is not valid json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response has no usable `{0}` field")]
    MissingField(&'static str),
}
