use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Login info file not found: {}", .0.display())]
    ConfigMissing(PathBuf),
    #[error("Config is missing a required key: {0}")]
    ConfigKey(&'static str),
    #[error("Config file is not valid JSON: {0}")]
    ConfigParse(#[source] serde_json::Error),

    #[error("Invalid date: {0}. Expected YYYY-MM-DD or YYYY/MM/DD.")]
    InvalidDate(String),
    #[error("Start date {start} is after end date {end}.")]
    InvalidRange { start: String, end: String },

    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Invalid Swarm URL {0}")]
    InvalidUrl(String),
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Swarm answered {status} for {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Configuration problems are fatal and never retried.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::ConfigMissing(_) | Error::ConfigKey(_) | Error::ConfigParse(_)
        )
    }
}
