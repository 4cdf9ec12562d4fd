use thiserror::Error;

/// Connection-level failures. Each one ends only the affected connection
/// (or, for `bind`, prevents the server from starting).
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Undecodable or overlong request line.
    #[error("malformed request: {0}")]
    Protocol(String),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
