use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected data from exchange: {0}")]
    UnexpectedData(String),

    #[error("No reachable endpoint among: {0:?}")]
    Unreachable(Vec<String>),
}

#[derive(Debug, Error, PartialEq)]
pub enum TrackerError {
    #[error("delta tracker has no baseline yet")]
    Uninitialized,

    #[error("symbol '{0}' was never seeded into the tracker")]
    UnknownSymbol(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("--port expects a value")]
    MissingPort,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}
