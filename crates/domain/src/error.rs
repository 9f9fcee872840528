/// Shared error type used across all HomeOps crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Every model was tried against every key without a success.
    #[error("all models failed, last error: {last}")]
    Exhausted { last: String },

    #[error("config: {0}")]
    Config(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("log source {source_tag}: {message}")]
    Fetch { source_tag: String, message: String },

    #[error("submit {kind}: {message}")]
    Submit { kind: String, message: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
