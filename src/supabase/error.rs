use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to backend failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success answer; `message` is the backend's own message.
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("could not decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(status: u16, message: impl Into<String>) -> StoreError {
        StoreError::Backend {
            status,
            message: message.into(),
        }
    }
}
