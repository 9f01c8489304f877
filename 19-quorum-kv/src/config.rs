//! Node configuration.

use std::time::Duration;

use crate::quorum::AckRule;

/// Identity, peers and tunables for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Human-readable node name, reported by `/status`.
    pub id: String,
    /// Address this node listens on and is known by (`host:port`).
    pub address: String,
    /// Every other replica. Must not include `address`.
    pub peers: Vec<String>,
    /// Client write deadline (default: 10s)
    pub write_timeout: Duration,
    /// Client read deadline (default: 10s)
    pub read_timeout: Duration,
    /// TCP connect timeout for outbound peer calls (default: 2s). Requests
    /// themselves are bounded only by the write or read deadline.
    pub connect_timeout: Duration,
    pub ack_rule: AckRule,
    /// Whether the coordinator's own apply counts toward W (default: true)
    pub count_local_write: bool,
    pub read_repair: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: "node".to_string(),
            address: "127.0.0.1:8000".to_string(),
            peers: Vec::new(),
            write_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(2),
            ack_rule: AckRule::default(),
            count_local_write: true,
            read_repair: true,
        }
    }
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.peers = peers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ack_rule(mut self, rule: AckRule) -> Self {
        self.ack_rule = rule;
        self
    }

    pub fn with_count_local_write(mut self, count: bool) -> Self {
        self.count_local_write = count;
        self
    }

    pub fn with_read_repair(mut self, enabled: bool) -> Self {
        self.read_repair = enabled;
        self
    }

    /// Strict comparison without counting the local apply.
    pub fn with_legacy_quorum(self) -> Self {
        self.with_ack_rule(AckRule::Strict).with_count_local_write(false)
    }
}
