use thiserror::Error;

/// Why a coordinated client operation did not succeed.
///
/// Both variants carry the success count observed so far, so callers can
/// make retry decisions. Only `QuorumNotReached` is a definite failure: on
/// `Timeout` a write may still land on some replicas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("quorum not reached ({acks} acks)")]
    QuorumNotReached { acks: usize },
    #[error("deadline elapsed before a quorum decision ({acks} acks)")]
    Timeout { acks: usize },
}

impl CoordinatorError {
    pub fn acks(&self) -> usize {
        match self {
            CoordinatorError::QuorumNotReached { acks } | CoordinatorError::Timeout { acks } => {
                *acks
            }
        }
    }
}

/// Failure of a single outbound call to a peer.
///
/// Every variant counts as exactly one failed acknowledgment. A peer that
/// rejected the request and a peer that could not be reached are treated the
/// same by the quorum arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("peer answered with status {0}")]
    Status(u16),
    #[error("peer call timed out")]
    Timeout,
    #[error("undecodable peer response: {0}")]
    Decode(String),
}

/// A replicated write that cannot be applied because it is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaWriteError {
    #[error("replicated write is missing its key")]
    MissingKey,
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}
