use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Proof carried by the genesis block. A protocol constant, never mined.
pub const GENESIS_PROOF: u64 = 1;

/// Previous-hash sentinel of the genesis block. Not a real digest: there is
/// no block before genesis.
pub const GENESIS_PREVIOUS_HASH: &str = "100";

/// A sealed block.
///
/// Field order is the canonical encoding order; [`Block::hash`] digests the
/// JSON wire form, so reordering fields changes every hash.
///
/// `timestamp` is held in UTC and always encoded with a `Z` suffix. A block
/// received with any other RFC3339 offset is normalized on decode, so its
/// hash here differs from the one its producer computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    #[serde(rename = "previousHash")]
    pub previous_hash: String,
}

impl Block {
    pub fn new(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: String) -> Self {
        Block {
            index,
            timestamp: Utc::now(),
            transactions,
            proof,
            previous_hash,
        }
    }

    /// Lowercase hex SHA-256 of the canonical encoding (64 characters).
    ///
    /// The timestamp is part of the digest, so re-sealing identical content
    /// at a different instant yields a different hash.
    pub fn hash(&self) -> Result<String, ChainError> {
        let encoded = serde_json::to_vec(self)
            .map_err(|e| ChainError::SerializationFailure(format!("block {}: {}", self.index, e)))?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

/// The local chain plus the pool of transactions waiting for the next block.
#[derive(Debug, Clone, Default)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
}

impl Blockchain {
    /// Create an initialized chain holding only the genesis block.
    pub fn new() -> Self {
        let mut blockchain = Self::default();
        blockchain.push_genesis();
        blockchain
    }

    /// Create the genesis block on an empty chain.
    pub fn initialize(&mut self) -> Result<&Block, ChainError> {
        if !self.blocks.is_empty() {
            return Err(ChainError::InvalidBlock(
                "Genesis block can only be created on an empty chain.".to_string(),
            ));
        }
        Ok(self.push_genesis())
    }

    fn push_genesis(&mut self) -> &Block {
        let genesis = Block::new(
            1,
            self.mempool.drain(),
            GENESIS_PROOF,
            GENESIS_PREVIOUS_HASH.to_string(),
        );
        self.blocks.push(genesis);
        &self.blocks[0]
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Queue a transaction and return the index the next sealed block will carry.
    pub fn add_transaction(&mut self, tx: Transaction) -> u64 {
        self.mempool.add_transaction(tx);
        self.next_index()
    }

    pub fn submit(&mut self, sender: &str, recipient: &str, amount: i64) -> u64 {
        self.add_transaction(Transaction::new(sender, recipient, amount))
    }

    /// Seal the pool into a new block.
    ///
    /// `previous_hash` defaults to the hash of the current tail. The pool is
    /// cleared only once the block is appended.
    pub fn seal(&mut self, proof: u64, previous_hash: Option<String>) -> Result<Block, ChainError> {
        let last = self.last_block()?;
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => last.hash()?,
        };

        let block = Block::new(self.next_index(), self.mempool.drain(), proof, previous_hash);
        self.blocks.push(block.clone());
        Ok(block)
    }

    pub fn next_index(&self) -> u64 {
        self.blocks.len() as u64 + 1
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Swap in a chain adopted through consensus. Pending transactions stay queued.
    pub(crate) fn replace_blocks(&mut self, blocks: Vec<Block>) {
        self.blocks = blocks;
    }
}
