//! Registry of known peer nodes

use serde::{Deserialize, Serialize};

/// A peer endpoint. Identity is the (url, ip_address) pair; location is a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerNode {
    pub url: String,
    pub ip_address: String,
    pub location: String,
}

impl PeerNode {
    pub fn new(url: impl Into<String>, ip_address: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ip_address: ip_address.into(),
            location: location.into(),
        }
    }

    pub fn same_endpoint(&self, url: &str, ip_address: &str) -> bool {
        self.url == url && self.ip_address == ip_address
    }

    /// Address of the peer's chain export. Bare `host:port` urls get `http://`.
    pub fn chain_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{}/chain", base)
        } else {
            format!("http://{}/chain", base)
        }
    }
}

/// Known peers in registration order. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<PeerNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless (url, ip_address) is already known. Returns whether a node was added.
    pub fn register(&mut self, url: &str, ip_address: &str, location: &str) -> bool {
        self.register_node(PeerNode::new(url, ip_address, location))
    }

    pub fn register_node(&mut self, node: PeerNode) -> bool {
        if self.contains(&node.url, &node.ip_address) {
            return false;
        }
        tracing::debug!(url = %node.url, ip = %node.ip_address, "registered peer");
        self.nodes.push(node);
        true
    }

    pub fn contains(&self, url: &str, ip_address: &str) -> bool {
        self.nodes.iter().any(|n| n.same_endpoint(url, ip_address))
    }

    pub fn nodes(&self) -> &[PeerNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
