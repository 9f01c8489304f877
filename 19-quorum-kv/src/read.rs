//! Client read path: gather R responses, keep the newest, repair stale copies.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn, Instrument};

use crate::error::{CoordinatorError, PeerError};
use crate::quorum::{AckRule, AckTally, Decision};
use crate::replica::ReplicaClient;
use crate::store::{LocalStore, Value};

/// Result of a successful read quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Newest value among the responses, `None` if every replica lacked the key.
    pub value: Option<Value>,
    /// Number of replicas (including this node) that answered.
    pub responses: usize,
}

/// Tunables for the read path.
#[derive(Debug, Clone)]
pub struct ReadPolicy {
    pub needed: usize,
    pub deadline: Duration,
    pub read_repair: bool,
}

/// Coordinates client reads against the local store and the node's peers.
pub struct ReadCoordinator {
    store: Arc<LocalStore>,
    peers: Arc<[String]>,
    client: Arc<dyn ReplicaClient>,
    policy: ReadPolicy,
}

/// One replica's answer. `peer` is `None` for the local store.
struct Response {
    peer: Option<String>,
    value: Option<Value>,
}

impl ReadCoordinator {
    pub fn new(
        store: Arc<LocalStore>,
        peers: Arc<[String]>,
        client: Arc<dyn ReplicaClient>,
        policy: ReadPolicy,
    ) -> Self {
        Self {
            store,
            peers,
            client,
            policy,
        }
    }

    pub fn policy(&self) -> &ReadPolicy {
        &self.policy
    }

    /// Reads `key` from a quorum of replicas.
    ///
    /// Not-found answers count toward the quorum. Stale replicas are repaired
    /// in the background; the caller never waits for repair.
    pub async fn read(&self, key: &str) -> Result<ReadOutcome, CoordinatorError> {
        let op = nanoid::nanoid!(10);
        let span = tracing::info_span!("read", %op, %key);
        self.coordinate(key).instrument(span).await
    }

    async fn coordinate(&self, key: &str) -> Result<ReadOutcome, CoordinatorError> {
        let deadline = Instant::now() + self.policy.deadline;

        let mut pending = FuturesUnordered::new();
        for peer in self.peers.iter() {
            let client = Arc::clone(&self.client);
            let peer = peer.clone();
            let key = key.to_string();
            pending.push(tokio::spawn(async move {
                let result = match timeout_at(deadline, client.fetch(&peer, &key)).await {
                    Ok(result) => result,
                    Err(_) => Err(PeerError::Timeout),
                };
                (peer, result)
            }));
        }

        // The local store always answers, and answers first.
        let mut tally = AckTally::new(AckRule::AtLeast, self.policy.needed, self.peers.len() + 1);
        let mut responses = vec![Response {
            peer: None,
            value: self.store.get(key),
        }];
        tally.record_success();

        loop {
            match tally.decision() {
                Decision::Reached => break,
                Decision::Unreachable => {
                    warn!(
                        responses = tally.successes(),
                        failures = tally.failures(),
                        needed = tally.needed(),
                        "read quorum unreachable"
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
                    return Err(CoordinatorError::QuorumNotReached {
                        acks: tally.successes(),
                    })
                }
                Ok(Some(_)) | Err(_) => {
                    warn!(
                        responses = tally.successes(),
                        outstanding = tally.outstanding(),
                        "read deadline elapsed"
                    );
                    return Err(CoordinatorError::Timeout {
                        acks: tally.successes(),
                    });
                }
            };

            match joined {
                Ok((peer, Ok(value))) => {
                    debug!(%peer, found = value.is_some(), "peer answered read");
                    responses.push(Response {
                        peer: Some(peer),
                        value,
                    });
                    tally.record_success();
                }
                Ok((peer, Err(err))) => {
                    warn!(%peer, error = %err, "peer read failed");
                    tally.record_failure();
                }
                Err(err) => {
                    warn!(error = %err, "peer read task aborted");
                    tally.record_failure();
                }
            }
        }

        let winner = newest(&responses);
        info!(
            responses = responses.len(),
            found = winner.is_some(),
            "read quorum reached"
        );

        if let (true, Some(winner)) = (self.policy.read_repair, winner.as_ref()) {
            self.repair(key, winner, &responses);
        }

        Ok(ReadOutcome {
            value: winner,
            responses: responses.len(),
        })
    }

    /// Pushes `winner` to every responder holding an older copy or none.
    fn repair(&self, key: &str, winner: &Value, responses: &[Response]) {
        let mut stale_peers = Vec::new();
        for response in responses {
            let is_stale = response
                .value
                .as_ref()
                .map_or(true, |held| held.timestamp < winner.timestamp);
            if !is_stale {
                continue;
            }
            match &response.peer {
                None => {
                    self.store.put(key.to_string(), winner.clone());
                    debug!("repaired local copy");
                }
                Some(peer) => stale_peers.push(peer.clone()),
            }
        }

        if stale_peers.is_empty() {
            return;
        }

        info!(stale = stale_peers.len(), "scheduling read repair");
        let client = Arc::clone(&self.client);
        let key = key.to_string();
        let winner = winner.clone();
        let limit = self.policy.deadline;
        tokio::spawn(
            async move {
                for peer in stale_peers {
                    match timeout(limit, client.replicate(&peer, &key, &winner)).await {
                        Ok(Ok(())) => debug!(%peer, "read repair delivered"),
                        Ok(Err(err)) => warn!(%peer, error = %err, "read repair failed"),
                        Err(_) => warn!(%peer, "read repair timed out"),
                    }
                }
            }
            .in_current_span(),
        );
    }
}

/// Highest timestamp wins; on a tie the earliest response is kept.
fn newest(responses: &[Response]) -> Option<Value> {
    let mut best: Option<&Value> = None;
    for value in responses.iter().filter_map(|r| r.value.as_ref()) {
        if best.map_or(true, |current| value.timestamp > current.timestamp) {
            best = Some(value);
        }
    }
    best.cloned()
}
