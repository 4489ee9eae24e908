use crate::blockchain::core::chain::Block;
use crate::error::ChainError;
use crate::miner::ProofOfWork;

/// Check a candidate chain's hash links and proof sequence on its own.
///
/// Only the candidate is inspected. Empty and single-block chains pass.
pub fn check_chain(chain: &[Block], pow: &ProofOfWork) -> Result<(), ChainError> {
    for pair in chain.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        let expected_hash = previous.hash()?;
        if current.previous_hash != expected_hash {
            return Err(ChainError::InvalidChain(format!(
                "block {} links to {}, expected {}",
                current.index, current.previous_hash, expected_hash
            )));
        }

        if !pow.valid_proof(previous.proof, current.proof) {
            return Err(ChainError::InvalidChain(format!(
                "block {} carries invalid proof {} (previous proof {})",
                current.index, current.proof, previous.proof
            )));
        }
    }
    Ok(())
}

pub fn is_valid_chain(chain: &[Block], pow: &ProofOfWork) -> bool {
    check_chain(chain, pow).is_ok()
}
