//! Peer-facing side of replication.
//!
//! - [`ReplicaClient`] is the outbound seam the coordinators call through.
//!   [`HttpReplicaClient`] implements it with reqwest; tests swap in mocks.
//! - [`ReplicaWriteHandler`] is the inbound path a peer's coordinator hits
//!   via `POST /internal/write`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{PeerError, ReplicaWriteError};
use crate::protocol::{ReadResponse, ReplicaWriteRequest};
use crate::store::{LocalStore, Value};

/// Outbound calls a coordinator makes to one peer.
#[async_trait]
pub trait ReplicaClient: Send + Sync {
    /// Sends `value` for `key` to the peer's replica write endpoint.
    async fn replicate(&self, peer: &str, key: &str, value: &Value) -> Result<(), PeerError>;

    /// Reads the peer's local copy of `key`. `Ok(None)` is an explicit not-found.
    async fn fetch(&self, peer: &str, key: &str) -> Result<Option<Value>, PeerError>;
}

/// HTTP/JSON implementation of [`ReplicaClient`].
#[derive(Debug, Clone)]
pub struct HttpReplicaClient {
    client: reqwest::Client,
}

impl HttpReplicaClient {
    /// Creates a client that gives up connecting after `connect_timeout`.
    ///
    /// No per-request timeout is set: callers bound each call by the
    /// operation's own deadline.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("failed to build peer HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReplicaClient for HttpReplicaClient {
    async fn replicate(&self, peer: &str, key: &str, value: &Value) -> Result<(), PeerError> {
        let url = format!("{}/internal/write", base_url(peer));
        let response = self
            .client
            .post(&url)
            .json(&ReplicaWriteRequest::new(key, value))
            .send()
            .await
            .map_err(classify)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PeerError::Status(response.status().as_u16()))
        }
    }

    async fn fetch(&self, peer: &str, key: &str) -> Result<Option<Value>, PeerError> {
        let url = format!("{}/internal/read", base_url(peer));
        let response = self
            .client
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(classify)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .json::<ReadResponse>()
                    .await
                    .map_err(|err| PeerError::Decode(err.to_string()))?;
                Ok(Some(body.into()))
            }
            status => Err(PeerError::Status(status.as_u16())),
        }
    }
}

/// Peers are configured as `host:port`; a scheme is optional.
pub fn base_url(peer: &str) -> String {
    let peer = peer.trim_end_matches('/');
    if peer.starts_with("http://") || peer.starts_with("https://") {
        peer.to_string()
    } else {
        format!("http://{peer}")
    }
}

fn classify(err: reqwest::Error) -> PeerError {
    if err.is_timeout() {
        PeerError::Timeout
    } else {
        PeerError::Unreachable(err.to_string())
    }
}

/// Applies writes replicated from peer coordinators to the local store.
#[derive(Debug, Clone)]
pub struct ReplicaWriteHandler {
    store: Arc<LocalStore>,
}

impl ReplicaWriteHandler {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Validates and merges one replicated write.
    ///
    /// Returns whether the last-writer-wins merge accepted the value. An
    /// older version leaves the store untouched, so redelivery is harmless.
    pub fn apply(&self, request: ReplicaWriteRequest) -> Result<bool, ReplicaWriteError> {
        let (key, value) = match parse(request) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "rejecting malformed replica write");
                return Err(err);
            }
        };

        let timestamp = value.timestamp;
        let applied = self.store.put(key.clone(), value);
        debug!(%key, timestamp, applied, "replica write merged");
        Ok(applied)
    }
}

fn parse(request: ReplicaWriteRequest) -> Result<(String, Value), ReplicaWriteError> {
    let key = match request.key {
        Some(key) if !key.is_empty() => key,
        _ => return Err(ReplicaWriteError::MissingKey),
    };
    let raw_ts = request.ts.unwrap_or_default();
    let timestamp = raw_ts
        .trim()
        .parse::<i64>()
        .map_err(|_| ReplicaWriteError::InvalidTimestamp(raw_ts.clone()))?;
    Ok((key, Value::new(request.value, timestamp)))
}
