use thiserror::Error;

/// Failure of a single chat turn.
///
/// The `Display` text is what gets rendered in place of the reply, so API
/// messages are passed through verbatim.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No API key configured. Set GEMINI_API_KEY or add \"api_key\" to the config file.")]
    MissingApiKey,

    /// Message taken from the `{error:{message}}` body
    #[error("{0}")]
    Api(String),

    #[error("Request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request task failed: {0}")]
    Task(String),
}
