//! A single replica: local state plus the coordinators that act on it.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::clock::LogicalClock;
use crate::config::NodeConfig;
use crate::error::{CoordinatorError, ReplicaWriteError};
use crate::protocol::{NodeStatus, ReplicaWriteRequest};
use crate::read::{ReadCoordinator, ReadOutcome, ReadPolicy};
use crate::replica::{HttpReplicaClient, ReplicaClient, ReplicaWriteHandler};
use crate::store::{LocalStore, Value};
use crate::topology::ReplicaTopology;
use crate::write::{WriteAck, WriteCoordinator, WritePolicy};

pub struct Node {
    id: String,
    topology: ReplicaTopology,
    store: Arc<LocalStore>,
    writer: WriteCoordinator,
    reader: ReadCoordinator,
    replica: ReplicaWriteHandler,
}

impl Node {
    /// Builds a node that reaches its peers through `client`.
    pub fn new(config: NodeConfig, client: Arc<dyn ReplicaClient>) -> Result<Self> {
        let topology = ReplicaTopology::new(config.address.clone(), config.peers.clone())?;
        let store = Arc::new(LocalStore::new());
        let clock = Arc::new(LogicalClock::new());
        let quorum = topology.quorum();

        let writer = WriteCoordinator::new(
            Arc::clone(&store),
            clock,
            topology.peers(),
            Arc::clone(&client),
            WritePolicy {
                needed: quorum,
                rule: config.ack_rule,
                count_local_write: config.count_local_write,
                deadline: config.write_timeout,
            },
        );
        let reader = ReadCoordinator::new(
            Arc::clone(&store),
            topology.peers(),
            client,
            ReadPolicy {
                needed: quorum,
                deadline: config.read_timeout,
                read_repair: config.read_repair,
            },
        );

        info!(
            id = %config.id,
            address = %topology.address(),
            n = topology.n(),
            w = quorum,
            r = quorum,
            rule = ?config.ack_rule,
            "node configured"
        );

        Ok(Self {
            id: config.id,
            replica: ReplicaWriteHandler::new(Arc::clone(&store)),
            topology,
            store,
            writer,
            reader,
        })
    }

    /// Builds a node that talks to peers over HTTP.
    pub fn with_http_client(config: NodeConfig) -> Result<Self> {
        let client = HttpReplicaClient::new(config.connect_timeout)?;
        Self::new(config, Arc::new(client))
    }

    pub async fn put(&self, key: String, payload: String) -> Result<WriteAck, CoordinatorError> {
        self.writer.write(key, payload).await
    }

    pub async fn get(&self, key: &str) -> Result<ReadOutcome, CoordinatorError> {
        self.reader.read(key).await
    }

    /// Inbound replicated write from a peer coordinator.
    pub fn apply_replica_write(&self, request: ReplicaWriteRequest) -> Result<bool, ReplicaWriteError> {
        self.replica.apply(request)
    }

    /// This node's own copy, without consulting peers.
    pub fn local_value(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            id: self.id.clone(),
            address: self.topology.address().to_string(),
            peers: self.topology.peers().to_vec(),
            n: self.topology.n(),
            w: self.writer.policy().needed,
            r: self.reader.policy().needed,
            keys: self.store.len(),
        }
    }
}
