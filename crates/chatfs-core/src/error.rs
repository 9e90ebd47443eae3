use thiserror::Error;

use crate::upstream::UpstreamError;

/// Errors produced by the adapter core.
///
/// Only the named kinds are produced here; transport failures are carried
/// unchanged in [`DriveError::Upstream`] so the serving layer can map them
/// to its own failure model.
#[derive(Error, Debug)]
pub enum DriveError {
    /// A composite key did not have 1-3 segments or a segment did not parse.
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// No resolution strategy produced a peer for a numeric id.
    #[error("Peer {id} not found: {last_error}")]
    PeerNotFound {
        id: i64,
        last_error: UpstreamError,
    },

    /// The message (or its thumbnail) is absent at the decoded location.
    #[error("Object not found")]
    ObjectNotFound,

    /// Mutating operations are permanently unsupported.
    #[error("Not implemented")]
    NotImplemented,

    /// The caller cancelled an in-flight transfer.
    #[error("Transfer cancelled")]
    Cancelled,

    /// Upstream returned fewer bytes than the advertised size.
    #[error("Short read: expected {expected} bytes, got {received}")]
    ShortRead { expected: u64, received: u64 },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DriveError>;
