//! The ledger service: the single owner of chain, pool and peer registry
//!
//! Every mutation goes through a write lock, so sealing (snapshot pool, build
//! block, clear pool) and chain replacement (compare, swap) are atomic with
//! respect to each other. Proof search runs on the blocking pool and is
//! cancelled when consensus swaps in a longer chain.

use crate::blockchain::{Block, Blockchain};
use crate::config::{parse_peer, Config};
use crate::error::ChainError;
use crate::miner::{MiningControl, ProofOfWork};
use crate::network::{NodeRegistry, PeerNode};
use crate::sync::{
    ChainResponse, ChainSource, ConsensusResolver, HttpChainSource,
    ProofOfWorkVerifier, ResolveOutcome,
};
use crate::transaction::Transaction;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct Ledger {
    node_id: String,
    pow: ProofOfWork,
    max_iterations: Option<u64>,
    chain: RwLock<Blockchain>,
    registry: RwLock<NodeRegistry>,
    resolver: ConsensusResolver,
    /// Serializes whole resolve sweeps; the swap itself happens under `chain`.
    resolving: tokio::sync::Mutex<()>,
    mining_jobs: Mutex<Vec<MiningControl>>,
}

impl Ledger {
    /// Build a ledger that fetches peer chains through `source` and validates
    /// them with proof-of-work at the ledger's own difficulty.
    pub fn new(node_id: impl Into<String>, pow: ProofOfWork, source: Arc<dyn ChainSource>) -> Self {
        let resolver = ConsensusResolver::new(source, Arc::new(ProofOfWorkVerifier::new(pow)));
        Self::with_resolver(node_id, pow, resolver)
    }

    pub fn with_resolver(node_id: impl Into<String>, pow: ProofOfWork, resolver: ConsensusResolver) -> Self {
        Self {
            node_id: node_id.into(),
            pow,
            max_iterations: None,
            chain: RwLock::new(Blockchain::new()),
            registry: RwLock::new(NodeRegistry::new()),
            resolver,
            resolving: tokio::sync::Mutex::new(()),
            mining_jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<u64>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Build an HTTP-backed ledger from configuration and register its bootstrap peers.
    pub async fn from_config(config: &Config, node_id: impl Into<String>) -> Result<Self, ChainError> {
        let timeout = Duration::from_secs(config.consensus.peer_timeout_secs);
        let pow = ProofOfWork::new(config.miner.difficulty);
        let source = Arc::new(HttpChainSource::new(timeout)?);
        let resolver = ConsensusResolver::new(source, Arc::new(ProofOfWorkVerifier::new(pow)))
            .with_peer_timeout(timeout);

        let ledger = Self::with_resolver(node_id, pow, resolver).with_max_iterations(config.miner.max_iterations);
        for peer in &config.network.bootstrap_peers {
            match parse_peer(peer) {
                Ok((url, ip, location)) => {
                    ledger.register_node(&url, &ip, &location).await;
                }
                Err(e) => warn!("ignoring bootstrap peer: {}", e),
            }
        }
        Ok(ledger)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn proof_of_work(&self) -> ProofOfWork {
        self.pow
    }

    /// Queue a transaction; returns the index of the block expected to include it.
    pub async fn submit_transaction(&self, sender: &str, recipient: &str, amount: i64) -> u64 {
        let mut chain = self.chain.write().await;
        let index = chain.submit(sender, recipient, amount);
        info!(sender, recipient, amount, index, "transaction queued");
        index
    }

    /// Find a proof on top of the current tail, reward `miner_address`, and seal.
    pub async fn mine(&self, miner_address: &str) -> Result<Block, ChainError> {
        let last_block = self.chain.read().await.last_block()?.clone();
        let last_hash = last_block.hash()?;

        let job = self.start_mining_job();
        let pow = self.pow;
        let control = job.control.clone();
        let last_proof = last_block.proof;
        let proof = tokio::task::spawn_blocking(move || pow.find_proof_bounded(last_proof, &control))
            .await
            .map_err(|e| ChainError::MiningAborted(format!("proof search task failed: {}", e)))??;

        self.commit_mined(&job.control, &last_block, last_hash, proof, miner_address)
            .await
    }

    /// Seal `proof` on top of `last_block`, unless the chain moved on meanwhile.
    async fn commit_mined(
        &self,
        control: &MiningControl,
        last_block: &Block,
        last_hash: String,
        proof: u64,
        miner_address: &str,
    ) -> Result<Block, ChainError> {
        let mut chain = self.chain.write().await;
        if control.is_cancelled() {
            return Err(ChainError::MiningAborted(
                "chain was replaced during proof search".to_string(),
            ));
        }
        if chain.last_block()?.hash()? != last_hash {
            return Err(ChainError::MiningAborted(format!(
                "chain tip moved past block {} during proof search",
                last_block.index
            )));
        }

        chain.add_transaction(Transaction::mining_reward(miner_address));
        let block = chain.seal(proof, Some(last_hash))?;
        info!(index = block.index, proof, transactions = block.transactions.len(), "mined block");
        Ok(block)
    }

    fn start_mining_job(&self) -> MiningJob<'_> {
        let control = MiningControl::new(self.max_iterations);
        self.mining_jobs.lock().push(control.clone());
        MiningJob { ledger: self, control }
    }

    pub async fn export_chain(&self) -> ChainResponse {
        ChainResponse::from_blocks(self.chain.read().await.blocks().to_vec())
    }

    pub async fn height(&self) -> usize {
        self.chain.read().await.len()
    }

    pub async fn last_block(&self) -> Result<Block, ChainError> {
        self.chain.read().await.last_block().cloned()
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.chain.read().await.mempool().get_all_transactions()
    }

    /// Returns whether the node was new.
    pub async fn register_node(&self, url: &str, ip_address: &str, location: &str) -> bool {
        self.registry.write().await.register(url, ip_address, location)
    }

    pub async fn nodes(&self) -> Vec<PeerNode> {
        self.registry.read().await.nodes().to_vec()
    }

    /// Run a consensus sweep; true iff the local chain was replaced.
    pub async fn resolve(&self) -> bool {
        self.resolve_detailed().await.replaced
    }

    pub async fn resolve_detailed(&self) -> ResolveOutcome {
        let _sweep = self.resolving.lock().await;

        let nodes = self.nodes().await;
        let local_length = self.height().await;
        let selection = self.resolver.resolve_against(local_length, &nodes).await;

        let mut chain = self.chain.write().await;
        let mut outcome = ResolveOutcome {
            failures: selection.failures,
            ..Default::default()
        };

        if let Some((node, blocks)) = selection.winner {
            // local chain may have grown while peers were polled
            if blocks.len() > chain.len() {
                info!(peer = %node.url, old = chain.len(), new = blocks.len(), "replacing local chain");
                chain.replace_blocks(blocks);
                self.cancel_mining();
                outcome.replaced = true;
                outcome.winner = Some(node);
            } else {
                warn!(peer = %node.url, "candidate no longer longer than local chain");
            }
        }

        outcome.length = chain.len();
        outcome
    }

    /// Number of proof searches currently running.
    pub fn active_mining_jobs(&self) -> usize {
        self.mining_jobs.lock().len()
    }

    fn cancel_mining(&self) {
        for job in self.mining_jobs.lock().iter() {
            job.cancel();
        }
    }
}

/// A registered proof search. Dropping it, including when the `mine` future
/// is abandoned mid-search, stops the search and unregisters it.
struct MiningJob<'a> {
    ledger: &'a Ledger,
    control: MiningControl,
}

impl Drop for MiningJob<'_> {
    fn drop(&mut self) {
        self.control.cancel();
        self.ledger
            .mining_jobs
            .lock()
            .retain(|c| !c.is_same_job(&self.control));
    }
}
