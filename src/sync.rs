//! Longest-valid-chain consensus
//!
//! The resolver polls every registered peer for its chain, validates the
//! candidates independently of local state, and picks the longest one that
//! strictly beats the local length. Failures are isolated per peer: an
//! unreachable or misbehaving node is logged and skipped, never fatal to the
//! sweep. This is not Byzantine-fault-tolerant; any peer that answers is
//! trusted to report its own chain, subject only to the [`ChainVerifier`].

use crate::blockchain::{check_chain, Block};
use crate::error::ChainError;
use crate::miner::ProofOfWork;
use crate::network::PeerNode;
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on a single peer query.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Chain export envelope, both served locally and fetched from peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: u64,
}

impl ChainResponse {
    pub fn from_blocks(chain: Vec<Block>) -> Self {
        let length = chain.len() as u64;
        Self { chain, length }
    }

    /// The reported length must describe the blocks actually carried.
    fn check_consistent(&self) -> Result<(), ChainError> {
        if self.length != self.chain.len() as u64 {
            return Err(ChainError::PeerResponseInvalid(format!(
                "reported length {} but sent {} blocks",
                self.length,
                self.chain.len()
            )));
        }
        Ok(())
    }
}

/// Where peer chains come from.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn fetch_chain(&self, node: &PeerNode) -> Result<ChainResponse, ChainError>;
}

/// Trust hook applied to every candidate chain before adoption.
pub trait ChainVerifier: Send + Sync {
    fn verify(&self, chain: &[Block]) -> Result<(), ChainError>;
}

/// Accepts chains whose hash links and proofs check out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProofOfWorkVerifier {
    pub pow: ProofOfWork,
}

impl ProofOfWorkVerifier {
    pub fn new(pow: ProofOfWork) -> Self {
        Self { pow }
    }
}

impl ChainVerifier for ProofOfWorkVerifier {
    fn verify(&self, chain: &[Block]) -> Result<(), ChainError> {
        check_chain(chain, &self.pow)
    }
}

/// Fetches `GET {url}/chain` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    client: reqwest::Client,
}

impl HttpChainSource {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::PeerUnreachable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, node: &PeerNode) -> Result<ChainResponse, ChainError> {
        let url = node.chain_url();
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainError::PeerUnreachable(format!("{}: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(ChainError::PeerResponseInvalid(format!(
                "{} answered with status {}",
                url,
                resp.status()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| ChainError::PeerUnreachable(format!("{}: {}", url, e)))?;
        serde_json::from_slice(&body)
            .map_err(|e| ChainError::PeerResponseInvalid(format!("{}: {}", url, e)))
    }
}

/// A peer that was skipped during a sweep, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerFailure {
    pub node: PeerNode,
    pub error: ChainError,
}

/// Result of comparing peer chains against the local length.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub winner: Option<(PeerNode, Vec<Block>)>,
    pub failures: Vec<PeerFailure>,
}

/// What a `resolve` sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub replaced: bool,
    pub winner: Option<PeerNode>,
    /// Local chain length after the sweep.
    pub length: usize,
    pub failures: Vec<PeerFailure>,
}

pub struct ConsensusResolver {
    source: Arc<dyn ChainSource>,
    verifier: Arc<dyn ChainVerifier>,
    peer_timeout: Duration,
}

impl ConsensusResolver {
    pub fn new(source: Arc<dyn ChainSource>, verifier: Arc<dyn ChainVerifier>) -> Self {
        Self {
            source,
            verifier,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
        }
    }

    pub fn with_peer_timeout(mut self, peer_timeout: Duration) -> Self {
        self.peer_timeout = peer_timeout;
        self
    }

    /// Query all peers concurrently. Results come back in `nodes` order.
    pub async fn poll_peers(&self, nodes: &[PeerNode]) -> Vec<(PeerNode, Result<ChainResponse, ChainError>)> {
        let queries = nodes.iter().map(|node| async move {
            let result = match tokio::time::timeout(self.peer_timeout, self.source.fetch_chain(node)).await {
                Ok(result) => result,
                Err(_) => Err(ChainError::PeerUnreachable(format!(
                    "{} did not answer within {:?}",
                    node.url, self.peer_timeout
                ))),
            };
            (node.clone(), result)
        });
        join_all(queries).await
    }

    /// Pick the longest valid chain strictly longer than `local_length`.
    ///
    /// Responses are considered in the given order, so the first peer to
    /// reach a maximum keeps it against later peers of equal length.
    pub fn select(
        &self,
        local_length: usize,
        responses: Vec<(PeerNode, Result<ChainResponse, ChainError>)>,
    ) -> Selection {
        let mut best_length = local_length as u64;
        let mut selection = Selection::default();

        for (node, result) in responses {
            let response = match result.and_then(|r| r.check_consistent().map(|_| r)) {
                Ok(response) => response,
                Err(error) => {
                    warn!(peer = %node.url, error = %error, "skipping peer");
                    selection.failures.push(PeerFailure { node, error });
                    continue;
                }
            };

            if response.length <= best_length {
                debug!(peer = %node.url, length = response.length, best = best_length, "peer chain not longer");
                continue;
            }

            if let Err(error) = self.verifier.verify(&response.chain) {
                warn!(peer = %node.url, length = response.length, error = %error, "rejecting peer chain");
                selection.failures.push(PeerFailure { node, error });
                continue;
            }

            best_length = response.length;
            selection.winner = Some((node, response.chain));
        }

        selection
    }

    /// Poll `nodes` and select a replacement for a local chain of `local_length`.
    pub async fn resolve_against(&self, local_length: usize, nodes: &[PeerNode]) -> Selection {
        let responses = self.poll_peers(nodes).await;
        let selection = self.select(local_length, responses);
        if let Some((node, chain)) = &selection.winner {
            info!(peer = %node.url, length = chain.len(), local = local_length, "found longer valid chain");
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;

    const TEST_DIFFICULTY: usize = 2;

    fn mined_chain(blocks: usize) -> Vec<Block> {
        let pow = ProofOfWork::new(TEST_DIFFICULTY);
        let mut chain = Blockchain::new();
        while chain.len() < blocks {
            let last_proof = chain.last_block().unwrap().proof;
            chain.seal(pow.find_proof(last_proof), None).unwrap();
        }
        chain.blocks().to_vec()
    }

    fn resolver() -> ConsensusResolver {
        struct Unused;
        #[async_trait]
        impl ChainSource for Unused {
            async fn fetch_chain(&self, _node: &PeerNode) -> Result<ChainResponse, ChainError> {
                Err(ChainError::PeerUnreachable("unused".into()))
            }
        }
        ConsensusResolver::new(
            Arc::new(Unused),
            Arc::new(ProofOfWorkVerifier::new(ProofOfWork::new(TEST_DIFFICULTY))),
        )
    }

    fn peer(name: &str) -> PeerNode {
        PeerNode::new(format!("http://{}", name), "127.0.0.1", "test")
    }

    #[test]
    fn test_select_prefers_longest_valid() {
        let mut invalid = mined_chain(8);
        invalid[4].proof += 1;

        let responses = vec![
            (peer("a"), Ok(ChainResponse::from_blocks(mined_chain(5)))),
            (peer("b"), Ok(ChainResponse::from_blocks(invalid))),
            (peer("c"), Ok(ChainResponse::from_blocks(mined_chain(7)))),
        ];

        let selection = resolver().select(5, responses);
        let (winner, chain) = selection.winner.unwrap();
        assert_eq!(winner, peer("c"));
        assert_eq!(chain.len(), 7);
        assert_eq!(selection.failures.len(), 1);
        assert_eq!(selection.failures[0].node, peer("b"));
    }

    #[test]
    fn test_equal_length_never_wins() {
        let responses = vec![(peer("a"), Ok(ChainResponse::from_blocks(mined_chain(3))))];
        assert!(resolver().select(3, responses).winner.is_none());
    }

    #[test]
    fn test_first_seen_maximum_wins_ties() {
        let responses = vec![
            (peer("a"), Ok(ChainResponse::from_blocks(mined_chain(4)))),
            (peer("b"), Ok(ChainResponse::from_blocks(mined_chain(4)))),
        ];
        let (winner, _) = resolver().select(1, responses).winner.unwrap();
        assert_eq!(winner, peer("a"));
    }

    #[test]
    fn test_inconsistent_length_is_rejected() {
        let mut response = ChainResponse::from_blocks(mined_chain(3));
        response.length = 30;
        let selection = resolver().select(1, vec![(peer("a"), Ok(response))]);
        assert!(selection.winner.is_none());
        assert!(matches!(
            selection.failures[0].error,
            ChainError::PeerResponseInvalid(_)
        ));
    }

    #[test]
    fn test_peer_errors_are_recorded_not_fatal() {
        let responses = vec![
            (peer("down"), Err(ChainError::PeerUnreachable("refused".into()))),
            (peer("ok"), Ok(ChainResponse::from_blocks(mined_chain(3)))),
        ];
        let selection = resolver().select(1, responses);
        assert_eq!(selection.winner.unwrap().0, peer("ok"));
        assert_eq!(selection.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_poll_peers_times_out_slow_peer() {
        tokio::time::timeout(Duration::from_secs(5), async {
            struct Slow;
            #[async_trait]
            impl ChainSource for Slow {
                async fn fetch_chain(&self, _node: &PeerNode) -> Result<ChainResponse, ChainError> {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(ChainResponse::from_blocks(vec![]))
                }
            }

            let resolver = ConsensusResolver::new(Arc::new(Slow), Arc::new(ProofOfWorkVerifier::default()))
                .with_peer_timeout(Duration::from_millis(50));
            let results = resolver.poll_peers(&[peer("slow")]).await;
            assert!(matches!(results[0].1, Err(ChainError::PeerUnreachable(_))));
        })
        .await
        .expect("test_poll_peers_times_out_slow_peer timed out");
    }
}
