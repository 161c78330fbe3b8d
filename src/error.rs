//! Error taxonomy (spec.md §7): transport failures are recovered locally and
//! never surfaced to callers; this type exists for the handful of paths
//! where surfacing is correct (CLI usage, configuration).

use thiserror::Error;
use tonic::Status;

#[derive(Debug, Error)]
pub enum ChordError {
    #[error("peer {0} unreachable")]
    UnreachablePeer(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("usage error: {0}")]
    Usage(String),

    #[error("rpc failed: {0}")]
    Rpc(#[from] Status),
}

impl ChordError {
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, ChordError::UnreachablePeer(_)) || matches!(self, ChordError::Rpc(s) if s.code() == tonic::Code::Unavailable || s.code() == tonic::Code::DeadlineExceeded)
    }
}

impl From<ChordError> for Status {
    fn from(err: ChordError) -> Self {
        match err {
            ChordError::UnreachablePeer(peer) => Status::unavailable(format!("unreachable: {peer}")),
            ChordError::Configuration(msg) => Status::invalid_argument(msg),
            ChordError::Usage(msg) => Status::invalid_argument(msg),
            ChordError::Rpc(status) => status,
        }
    }
}
