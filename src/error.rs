//! Error types for proofchain

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Operation needs at least the genesis block.
    EmptyChain,
    SerializationFailure(String),
    PeerUnreachable(String),
    PeerResponseInvalid(String),
    InvalidChain(String),
    InvalidBlock(String),
    MiningAborted(String),
    ProofSearchExhausted(u64),
}

impl ChainError {
    /// Peer errors are contained by the resolver and never abort a sweep.
    pub fn is_peer_error(&self) -> bool {
        matches!(
            self,
            ChainError::PeerUnreachable(_) | ChainError::PeerResponseInvalid(_)
        )
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::EmptyChain => write!(f, "Chain is empty; initialize the ledger first"),
            ChainError::SerializationFailure(msg) => write!(f, "Serialization failure: {}", msg),
            ChainError::PeerUnreachable(msg) => write!(f, "Peer unreachable: {}", msg),
            ChainError::PeerResponseInvalid(msg) => write!(f, "Invalid peer response: {}", msg),
            ChainError::InvalidChain(msg) => write!(f, "Invalid chain: {}", msg),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::MiningAborted(msg) => write!(f, "Mining aborted: {}", msg),
            ChainError::ProofSearchExhausted(n) => {
                write!(f, "No valid proof found within {} attempts", n)
            }
        }
    }
}

impl std::error::Error for ChainError {}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationFailure(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_errors_are_classified() {
        assert!(ChainError::PeerUnreachable("x".into()).is_peer_error());
        assert!(ChainError::PeerResponseInvalid("x".into()).is_peer_error());
        assert!(!ChainError::EmptyChain.is_peer_error());
        assert!(!ChainError::InvalidChain("x".into()).is_peer_error());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ChainError::ProofSearchExhausted(10).to_string(),
            "No valid proof found within 10 attempts"
        );
        assert!(ChainError::EmptyChain.to_string().contains("empty"));
    }
}
