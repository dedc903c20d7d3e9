use thiserror::Error;

/// Errors surfaced by the Trellis client.
///
/// The first four variants map to distinct backend outcomes; the rest cover
/// transport failures and malformed payloads, which callers treat as the
/// generic failure path.
#[derive(Debug, Error)]
pub enum TrellisError {
    /// Could not establish or keep the WebSocket channel.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend declined the submitted job. Terminal, not retried.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The backend reported an error status while the job was running.
    #[error("processing failed: {0}")]
    Processing(String),

    /// Unexpected status during a chunk fetch. Terminal for that artifact only.
    #[error("server error: {0}")]
    Server(String),

    /// No reply arrived within the configured idle deadline.
    #[error("timed out waiting for server reply")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed server payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid chunk encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrellisError>;
