//! Unified error types for tsync.
//!
//! Every variant renders with a stable code prefix so log lines and
//! error responses can be grepped by failure class.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offline sync engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty cache name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The transport threw before producing a response.
    #[error("TRANSPORT_FAILURE: {0}")]
    Transport(String),

    /// The offline store could not be opened or migrated.
    #[error("STORE_UNAVAILABLE: {0}")]
    StoreUnavailable(String),

    /// Entity absent from both the caches and the offline store.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// A write body or stored document could not be parsed.
    #[error("MALFORMED_PAYLOAD: {0}")]
    MalformedPayload(String),

    /// A queued write could not be resubmitted.
    #[error("REPLAY_FAILED: record {id}: {reason}")]
    ReplayFailed { id: i64, reason: String },

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Whether the failure came from the network layer rather than local state.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedPayload(err.to_string())
    }
}
