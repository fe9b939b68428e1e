use std::path::PathBuf;

use thiserror::Error;

/// A single failed call to the Bot API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The API answered with `ok: false`.
    #[error("telegram api error ({code}): {description}")]
    Api { code: i64, description: String },

    #[error("http error: {0}")]
    Http(reqwest::Error),

    #[error("unexpected response (status {status}): {detail}")]
    Malformed { status: u16, detail: String },

    #[error("cannot read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TransportError {
    /// True when the API refused the request as malformed, which for text
    /// messages almost always means entities it could not parse.
    pub fn is_format_rejection(&self) -> bool {
        matches!(self, TransportError::Api { code: 400, .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the bot token.
        TransportError::Http(e.without_url())
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: TransportError,
    },
}
