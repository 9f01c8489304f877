//! End-to-end tests against real nodes serving HTTP on localhost.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use quorum_kv::client::{GetOutcome, KvClient, PutOutcome};
use quorum_kv::config::NodeConfig;
use quorum_kv::error::CoordinatorError;
use quorum_kv::node::Node;
use quorum_kv::protocol::ReplicaWriteRequest;
use quorum_kv::runtime::Server;
use quorum_kv::store::Value;

/// Nodes on ephemeral ports, optionally with peers that are never served.
struct TestCluster {
    addrs: Vec<String>,
    nodes: Vec<Arc<Node>>,
    shutdowns: Vec<oneshot::Sender<()>>,
    tasks: Vec<JoinHandle<Result<()>>>,
}

impl TestCluster {
    async fn start(n: usize) -> Result<Self> {
        Self::start_with(n, 0, |config| config).await
    }

    /// Starts `live` nodes whose peer lists also name `dead` addresses that
    /// refuse connections.
    async fn start_with<F>(live: usize, dead: usize, configure: F) -> Result<Self>
    where
        F: Fn(NodeConfig) -> NodeConfig,
    {
        let mut listeners = Vec::new();
        for _ in 0..live {
            listeners.push(TcpListener::bind("127.0.0.1:0").await?);
        }
        let mut all_addrs: Vec<String> = listeners
            .iter()
            .map(|l| l.local_addr().map(|a| a.to_string()))
            .collect::<std::io::Result<_>>()?;
        for _ in 0..dead {
            // Bound then dropped, so the port refuses connections.
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            all_addrs.push(listener.local_addr()?.to_string());
        }

        let mut cluster = Self {
            addrs: all_addrs[..live].to_vec(),
            nodes: Vec::new(),
            shutdowns: Vec::new(),
            tasks: Vec::new(),
        };

        for (i, listener) in listeners.into_iter().enumerate() {
            let address = all_addrs[i].clone();
            let peers: Vec<String> = all_addrs.iter().filter(|a| **a != address).cloned().collect();
            let config = configure(
                NodeConfig::new(format!("node-{i}"), address)
                    .with_peers(peers)
                    .with_connect_timeout(Duration::from_millis(500))
                    .with_write_timeout(Duration::from_secs(2))
                    .with_read_timeout(Duration::from_secs(2)),
            );
            let node = Arc::new(Node::with_http_client(config)?);
            let server = Server::new(listener, Arc::clone(&node));
            let (tx, rx) = oneshot::channel();
            cluster.tasks.push(tokio::spawn(server.run_until(async move {
                let _ = rx.await;
            })));
            cluster.shutdowns.push(tx);
            cluster.nodes.push(node);
        }

        Ok(cluster)
    }

    fn client(&self, i: usize) -> Result<KvClient> {
        KvClient::new(&self.addrs[i])
    }

    fn node(&self, i: usize) -> &Arc<Node> {
        &self.nodes[i]
    }

    /// Polls until `check` holds on every listed node.
    async fn wait_for<F>(&self, nodes: &[usize], timeout: Duration, check: F) -> Result<()>
    where
        F: Fn(&Node) -> bool,
    {
        let start = tokio::time::Instant::now();
        loop {
            if nodes.iter().all(|&i| check(self.node(i).as_ref())) {
                return Ok(());
            }
            if start.elapsed() > timeout {
                bail!("condition not met on nodes {nodes:?} within {timeout:?}");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn shutdown(self) -> Result<()> {
        for tx in self.shutdowns {
            let _ = tx.send(());
        }
        for task in self.tasks {
            task.await??;
        }
        Ok(())
    }
}

fn inject(node: &Node, key: &str, payload: &str, ts: i64) {
    node.apply_replica_write(ReplicaWriteRequest::new(key, &Value::new(payload, ts)))
        .expect("valid replica write");
}

/// Accepts connections and never answers on them.
async fn silent_peer() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    Ok(addr)
}

#[tokio::test]
async fn write_on_one_node_is_readable_from_every_node() -> Result<()> {
    let cluster = TestCluster::start(3).await?;

    let outcome = cluster.client(0)?.put("greeting", "hello").await?;
    assert!(matches!(outcome, PutOutcome::Ok { acks } if acks >= 2));

    cluster
        .wait_for(&[0, 1, 2], Duration::from_secs(2), |node| {
            node.local_value("greeting").is_some()
        })
        .await?;

    for i in 0..3 {
        match cluster.client(i)?.get("greeting").await? {
            GetOutcome::Found(value) => assert_eq!(value.payload, "hello"),
            other => panic!("node {i} answered {other:?}"),
        }
    }

    cluster.shutdown().await
}

#[tokio::test]
async fn missing_key_is_not_found() -> Result<()> {
    let cluster = TestCluster::start(3).await?;
    assert_eq!(cluster.client(1)?.get("nothing").await?, GetOutcome::NotFound);
    cluster.shutdown().await
}

#[tokio::test]
async fn later_write_wins_everywhere() -> Result<()> {
    let cluster = TestCluster::start(3).await?;

    cluster.client(0)?.put("k", "first").await?;
    cluster.client(2)?.put("k", "second").await?;

    cluster
        .wait_for(&[0, 1, 2], Duration::from_secs(2), |node| {
            node.local_value("k").map(|v| v.payload) == Some("second".to_string())
        })
        .await?;

    cluster.shutdown().await
}

#[tokio::test]
async fn legacy_rule_cannot_reach_quorum_with_two_peers() -> Result<()> {
    let cluster = TestCluster::start_with(3, 0, NodeConfig::with_legacy_quorum).await?;

    // Both peers acknowledge, but the strict rule needs more than W = 2.
    let outcome = cluster.client(0)?.put("k", "v").await?;
    assert_eq!(outcome, PutOutcome::QuorumNotReached { acks: 2 });

    // The failed write is not rolled back anywhere.
    cluster
        .wait_for(&[0, 1, 2], Duration::from_secs(2), |node| {
            node.local_value("k").is_some()
        })
        .await?;

    cluster.shutdown().await
}

#[tokio::test]
async fn write_survives_one_dead_peer() -> Result<()> {
    let cluster = TestCluster::start_with(2, 1, |config| config).await?;

    let outcome = cluster.client(0)?.put("k", "v").await?;
    assert!(matches!(outcome, PutOutcome::Ok { acks } if acks >= 2));

    match cluster.client(1)?.get("k").await? {
        GetOutcome::Found(value) => assert_eq!(value.payload, "v"),
        other => panic!("unexpected read outcome {other:?}"),
    }

    cluster.shutdown().await
}

#[tokio::test]
async fn all_peers_dead_fails_with_quorum_not_reached() -> Result<()> {
    let cluster = TestCluster::start_with(1, 2, |config| config).await?;

    let client = cluster.client(0)?;
    assert_eq!(
        client.put("k", "v").await?,
        PutOutcome::QuorumNotReached { acks: 1 }
    );
    assert_eq!(
        client.get("k").await?,
        GetOutcome::QuorumNotReached { acks: 1 }
    );
    // The coordinator kept its local apply.
    assert!(cluster.node(0).local_value("k").is_some());

    cluster.shutdown().await
}

#[tokio::test]
async fn read_repairs_a_stale_coordinator() -> Result<()> {
    let cluster = TestCluster::start(3).await?;
    inject(cluster.node(0), "k", "old", 10);
    inject(cluster.node(1), "k", "new", 20);
    inject(cluster.node(2), "k", "new", 20);

    assert_eq!(
        cluster.client(0)?.get("k").await?,
        GetOutcome::Found(Value::new("new", 20))
    );
    assert_eq!(cluster.node(0).local_value("k"), Some(Value::new("new", 20)));

    cluster.shutdown().await
}

#[tokio::test]
async fn read_repairs_a_stale_peer() -> Result<()> {
    let cluster = TestCluster::start(3).await?;
    inject(cluster.node(0), "k", "new", 20);
    inject(cluster.node(1), "k", "old", 10);

    assert_eq!(
        cluster.client(0)?.get("k").await?,
        GetOutcome::Found(Value::new("new", 20))
    );

    // Whichever peer answered is repaired in the background.
    cluster
        .wait_for(&[0], Duration::from_secs(2), |_| {
            [1, 2]
                .iter()
                .any(|&i| cluster.node(i).local_value("k") == Some(Value::new("new", 20)))
        })
        .await?;

    cluster.shutdown().await
}

#[tokio::test]
async fn disabled_read_repair_leaves_replicas_alone() -> Result<()> {
    let cluster = TestCluster::start_with(3, 0, |config| config.with_read_repair(false)).await?;
    inject(cluster.node(0), "k", "old", 10);
    inject(cluster.node(1), "k", "new", 20);
    inject(cluster.node(2), "k", "new", 20);

    assert_eq!(
        cluster.client(0)?.get("k").await?,
        GetOutcome::Found(Value::new("new", 20))
    );
    assert_eq!(cluster.node(0).local_value("k"), Some(Value::new("old", 10)));

    cluster.shutdown().await
}

#[tokio::test]
async fn status_and_method_checks_over_http() -> Result<()> {
    let cluster = TestCluster::start(3).await?;

    let status = cluster.client(0)?.status().await?;
    assert_eq!(status.n, 2);
    assert_eq!(status.w, 2);
    assert_eq!(status.peers.len(), 2);

    let http = reqwest::Client::new();
    let response = http
        .get(format!("http://{}/put", cluster.addrs[0]))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({"error": "POST only"}));

    let response = http
        .post(format!("http://{}/put", cluster.addrs[0]))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    cluster.shutdown().await
}

#[tokio::test]
async fn silent_peers_time_out_at_the_request_deadline() -> Result<()> {
    let peers = vec![silent_peer().await?, silent_peer().await?];
    // Deadlines longer than the default connect timeout.
    let deadline = Duration::from_millis(2_500);
    let config = NodeConfig::new("a", "127.0.0.1:1")
        .with_peers(peers)
        .with_write_timeout(deadline)
        .with_read_timeout(deadline);
    let node = Node::with_http_client(config)?;

    let started = tokio::time::Instant::now();
    let err = node.put("k".into(), "v".into()).await.unwrap_err();
    assert_eq!(err, CoordinatorError::Timeout { acks: 1 });
    assert!(started.elapsed() >= deadline);

    let started = tokio::time::Instant::now();
    let err = node.get("k").await.unwrap_err();
    assert_eq!(err, CoordinatorError::Timeout { acks: 1 });
    assert!(started.elapsed() >= deadline);

    Ok(())
}
