/// Transaction types for proofchain
use serde::{Deserialize, Serialize};

/// Reserved sender id used for the mining reward transaction.
pub const MINING_REWARD_SENDER: &str = "0";

/// Amount credited to the miner for sealing a block.
pub const MINING_REWARD: i64 = 1;

/// A value transfer waiting in the pool or sealed into a block.
///
/// Amounts are taken as-is: no sign or balance checks are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// The reward transaction appended to the pool before a mined block is sealed.
    pub fn mining_reward(miner_address: impl Into<String>) -> Self {
        Transaction::new(MINING_REWARD_SENDER, miner_address, MINING_REWARD)
    }

    pub fn is_mining_reward(&self) -> bool {
        self.sender == MINING_REWARD_SENDER
    }
}
