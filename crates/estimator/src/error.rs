use protocol::ParseError;

/// Why one signal's fetch failed. Cancellation is not an error and never
/// reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
}
