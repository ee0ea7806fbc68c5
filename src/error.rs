use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Failures reported by the HTTP capability.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("server ignored range request for bytes {start}-{end}")]
    RangeIgnored { start: u64, end: u64 },

    #[error("connection closed at byte {at}, expected data up to {end}")]
    UnexpectedEof { at: u64, end: u64 },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("corrupt download state: {0}")]
    StateCorrupt(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}
