//! Client write path: timestamp, apply locally, fan out, count acks.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn, Instrument};

use crate::clock::LogicalClock;
use crate::error::{CoordinatorError, PeerError};
use crate::quorum::{AckRule, AckTally, Decision};
use crate::replica::ReplicaClient;
use crate::store::{LocalStore, Value};

/// Successful write outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    pub acks: usize,
    pub timestamp: i64,
}

/// Tunables for the write path.
#[derive(Debug, Clone)]
pub struct WritePolicy {
    pub needed: usize,
    pub rule: AckRule,
    pub count_local_write: bool,
    pub deadline: Duration,
}

/// Coordinates client writes against the node's peers.
pub struct WriteCoordinator {
    store: Arc<LocalStore>,
    clock: Arc<LogicalClock>,
    peers: Arc<[String]>,
    client: Arc<dyn ReplicaClient>,
    policy: WritePolicy,
}

impl WriteCoordinator {
    pub fn new(
        store: Arc<LocalStore>,
        clock: Arc<LogicalClock>,
        peers: Arc<[String]>,
        client: Arc<dyn ReplicaClient>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            store,
            clock,
            peers,
            client,
            policy,
        }
    }

    pub fn policy(&self) -> &WritePolicy {
        &self.policy
    }

    /// Writes `payload` under `key` and waits for a quorum decision.
    ///
    /// The local store is updated before any peer is contacted, and that
    /// update is never rolled back. Peer dispatches run as detached tasks:
    /// when the deadline elapses the coordinator stops waiting, but a peer
    /// may still apply the write afterwards.
    pub async fn write(&self, key: String, payload: String) -> Result<WriteAck, CoordinatorError> {
        let op = nanoid::nanoid!(10);
        let span = tracing::info_span!("write", %op, %key);
        self.coordinate(key, payload).instrument(span).await
    }

    async fn coordinate(&self, key: String, payload: String) -> Result<WriteAck, CoordinatorError> {
        let deadline = Instant::now() + self.policy.deadline;
        let value = Value::new(payload, self.clock.next_timestamp());
        let timestamp = value.timestamp;

        self.store.put(key.clone(), value.clone());

        let local = usize::from(self.policy.count_local_write);
        let mut tally = AckTally::new(
            self.policy.rule,
            self.policy.needed,
            self.peers.len() + local,
        );
        if self.policy.count_local_write {
            tally.record_success();
        }

        let mut pending = FuturesUnordered::new();
        for peer in self.peers.iter() {
            let client = Arc::clone(&self.client);
            let peer = peer.clone();
            let key = key.clone();
            let value = value.clone();
            pending.push(tokio::spawn(async move {
                let result = match timeout_at(deadline, client.replicate(&peer, &key, &value)).await {
                    Ok(result) => result,
                    Err(_) => Err(PeerError::Timeout),
                };
                (peer, result)
            }));
        }

        loop {
            match tally.decision() {
                Decision::Reached => {
                    info!(acks = tally.successes(), timestamp, "write quorum reached");
                    return Ok(WriteAck {
                        acks: tally.successes(),
                        timestamp,
                    });
                }
                Decision::Unreachable => {
                    warn!(
                        acks = tally.successes(),
                        failures = tally.failures(),
                        needed = tally.needed(),
                        "write quorum unreachable"
                    );
                    return Err(CoordinatorError::QuorumNotReached {
                        acks: tally.successes(),
                    });
                }
                Decision::Pending => {}
            }

            // A result that lands at or after the deadline may be a peer
            // task's own deadline expiry; it must not count as a failure.
            let joined = match timeout_at(deadline, pending.next()).await {
                Ok(Some(joined)) if Instant::now() < deadline => joined,
                Ok(None) => {
                    warn!(
                        acks = tally.successes(),
                        failures = tally.failures(),
                        "all peers answered without a write quorum"
                    );
                    return Err(CoordinatorError::QuorumNotReached {
                        acks: tally.successes(),
                    });
                }
                Ok(Some(_)) | Err(_) => {
                    warn!(
                        acks = tally.successes(),
                        outstanding = tally.outstanding(),
                        "write deadline elapsed"
                    );
                    return Err(CoordinatorError::Timeout {
                        acks: tally.successes(),
                    });
                }
            };

            match joined {
                Ok((peer, Ok(()))) => {
                    debug!(%peer, "peer acknowledged write");
                    tally.record_success();
                }
                Ok((peer, Err(err))) => {
                    warn!(%peer, error = %err, "replication to peer failed");
                    tally.record_failure();
                }
                Err(err) => {
                    warn!(error = %err, "replication task aborted");
                    tally.record_failure();
                }
            }
        }
    }
}
