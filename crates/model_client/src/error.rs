use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("malformed stream payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("stream error: {0}")]
    Stream(String),
}
