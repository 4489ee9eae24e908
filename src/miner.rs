//! Proof-of-work search and verification
//!
//! A proof `p'` is valid against the previous proof `p` when the SHA-256
//! digest of the decimal string `"{p}{p'}"` starts with `difficulty` zero hex
//! characters. This predicate is the only block-admission gate in the ledger.

use crate::error::ChainError;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Number of leading zero hex characters required by the reference protocol.
pub const DEFAULT_DIFFICULTY: usize = 5;

/// Upper bound on difficulty: a SHA-256 hex digest has 64 characters.
pub const MAX_DIFFICULTY: usize = 64;

/// How many candidates are tried between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    pub difficulty: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }

    pub fn valid_proof(&self, last_proof: u64, proof: u64) -> bool {
        let guess = format!("{}{}", last_proof, proof);
        let digest = Sha256::digest(guess.as_bytes());
        leading_zero_nibbles(&digest) >= self.difficulty
    }

    /// Scan nonces from 0 upward and return the first valid one. Unbounded.
    pub fn find_proof(&self, last_proof: u64) -> u64 {
        let mut proof = 0u64;
        while !self.valid_proof(last_proof, proof) {
            proof += 1;
        }
        proof
    }

    /// Same scan as [`find_proof`](Self::find_proof), but gives up when the
    /// control is cancelled or its iteration budget runs out.
    pub fn find_proof_bounded(
        &self,
        last_proof: u64,
        control: &MiningControl,
    ) -> Result<u64, ChainError> {
        let mut proof = 0u64;
        loop {
            if let Some(max) = control.max_iterations {
                if proof >= max {
                    return Err(ChainError::ProofSearchExhausted(max));
                }
            }
            if proof % CANCEL_CHECK_INTERVAL == 0 && control.is_cancelled() {
                return Err(ChainError::MiningAborted(format!(
                    "proof search cancelled after {} attempts",
                    proof
                )));
            }
            if self.valid_proof(last_proof, proof) {
                return Ok(proof);
            }
            proof = proof.checked_add(1).ok_or(ChainError::ProofSearchExhausted(u64::MAX))?;
        }
    }
}

/// Checks `proof` against `last_proof` at [`DEFAULT_DIFFICULTY`].
pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
    ProofOfWork::default().valid_proof(last_proof, proof)
}

/// Finds the first proof for `last_proof` at [`DEFAULT_DIFFICULTY`].
pub fn find_proof(last_proof: u64) -> u64 {
    ProofOfWork::default().find_proof(last_proof)
}

fn leading_zero_nibbles(digest: &[u8]) -> usize {
    let mut count = 0;
    for byte in digest {
        if *byte == 0 {
            count += 2;
            continue;
        }
        if byte >> 4 == 0 {
            count += 1;
        }
        break;
    }
    count
}

/// Shared cancel flag plus optional iteration cap for one proof search.
#[derive(Debug, Clone, Default)]
pub struct MiningControl {
    cancelled: Arc<AtomicBool>,
    pub max_iterations: Option<u64>,
}

impl MiningControl {
    pub fn new(max_iterations: Option<u64>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            max_iterations,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// True when both handles control the same search.
    pub fn is_same_job(&self, other: &MiningControl) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_digest(s: &str) -> String {
        hex::encode(Sha256::digest(s.as_bytes()))
    }

    #[test]
    fn test_valid_proof_matches_hex_prefix() {
        let expected = hex_digest("123450").starts_with("00000");
        assert_eq!(valid_proof(12345, 0), expected);
    }

    #[test]
    fn test_find_proof_satisfies_predicate() {
        let pow = ProofOfWork::new(3);
        for last_proof in [0u64, 1, 100, 12345, 987_654_321] {
            let proof = pow.find_proof(last_proof);
            assert!(pow.valid_proof(last_proof, proof));
            assert!(hex_digest(&format!("{}{}", last_proof, proof)).starts_with("000"));
            // first satisfying candidate
            assert!((0..proof).all(|p| !pow.valid_proof(last_proof, p)));
        }
    }

    #[test]
    fn test_find_proof_default_difficulty() {
        let proof = find_proof(1);
        assert!(valid_proof(1, proof));
        assert!(hex_digest(&format!("1{}", proof)).starts_with("00000"));
    }

    #[test]
    fn test_leading_zero_nibbles() {
        assert_eq!(leading_zero_nibbles(&[0x00, 0x0f, 0xff]), 3);
        assert_eq!(leading_zero_nibbles(&[0x10]), 0);
        assert_eq!(leading_zero_nibbles(&[0x00, 0x00]), 4);
    }

    #[test]
    fn test_bounded_search_matches_unbounded() {
        let pow = ProofOfWork::new(3);
        let control = MiningControl::new(None);
        assert_eq!(pow.find_proof_bounded(42, &control), Ok(pow.find_proof(42)));
    }

    #[test]
    fn test_cancelled_search_aborts() {
        let pow = ProofOfWork::new(MAX_DIFFICULTY);
        let control = MiningControl::new(None);
        control.cancel();
        assert!(matches!(
            pow.find_proof_bounded(7, &control),
            Err(ChainError::MiningAborted(_))
        ));
    }

    #[test]
    fn test_iteration_cap() {
        let pow = ProofOfWork::new(MAX_DIFFICULTY);
        let control = MiningControl::new(Some(10));
        assert_eq!(
            pow.find_proof_bounded(7, &control),
            Err(ChainError::ProofSearchExhausted(10))
        );
    }
}
