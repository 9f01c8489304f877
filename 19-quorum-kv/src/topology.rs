use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{ensure, Result};

use crate::quorum::majority;

/// Validated static membership as seen from one node.
///
/// N counts peers only; the node itself is not part of it.
#[derive(Debug, Clone)]
pub struct ReplicaTopology {
    address: String,
    peers: Arc<[String]>,
}

impl ReplicaTopology {
    pub fn new(address: impl Into<String>, peers: Vec<String>) -> Result<Self> {
        let address = address.into();
        ensure!(!address.is_empty(), "node address must not be empty");

        let mut seen = HashSet::new();
        for peer in &peers {
            ensure!(!peer.is_empty(), "peer address must not be empty");
            ensure!(
                *peer != address,
                "peer list must not contain this node's own address {address}"
            );
            ensure!(seen.insert(peer.as_str()), "duplicate peer {peer}");
        }

        Ok(Self {
            address,
            peers: peers.into(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn peers(&self) -> Arc<[String]> {
        Arc::clone(&self.peers)
    }

    pub fn n(&self) -> usize {
        self.peers.len()
    }

    /// W and R are both a majority of the peers.
    pub fn quorum(&self) -> usize {
        majority(self.n())
    }
}
