use reqwest::StatusCode;
use thiserror::Error;

/// Failures while retrieving the news feed.
///
/// Every variant is handled the same way by the news component: logged,
/// previous state kept, error panel shown.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Feed responded with status {0}")]
    Status(StatusCode),

    #[error("Feed body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Invalid page name: {0}")]
    InvalidPage(String),

    #[error("Page not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
pub type SiteResult<T> = Result<T, SiteError>;
