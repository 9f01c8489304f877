use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::http;
use crate::node::Node;

/// A bound listener plus the node it serves.
///
/// Binding happens before the node is built so callers can use port 0 and
/// learn the real address first.
pub struct Server {
    listener: TcpListener,
    node: Arc<Node>,
}

impl Server {
    pub fn new(listener: TcpListener, node: Arc<Node>) -> Self {
        Self { listener, node }
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server { listener, node } = self;
        let addr = listener.local_addr().context("listener has no local address")?;
        info!(%addr, "serving");

        axum::serve(listener, http::router(node))
            .with_graceful_shutdown(shutdown)
            .await
            .context("http server failed")?;

        info!(%addr, "server stopped");
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}
