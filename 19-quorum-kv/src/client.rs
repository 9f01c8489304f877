//! Client for a node's public routes.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;

use crate::protocol::{ErrorBody, NodeStatus, PutRequest, PutResponse, ReadResponse};
use crate::replica::base_url;
use crate::store::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Ok { acks: usize },
    QuorumNotReached { acks: usize },
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    Found(Value),
    NotFound,
    QuorumNotReached { acks: usize },
    Timeout,
}

#[derive(Debug, Clone)]
pub struct KvClient {
    base: String,
    http: reqwest::Client,
}

impl KvClient {
    /// `node` is `host:port` or a full base URL.
    pub fn new(node: &str) -> Result<Self> {
        // Must outlast the node's write and read deadlines.
        Self::with_timeout(node, Duration::from_secs(30))
    }

    pub fn with_timeout(node: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base: base_url(node),
            http,
        })
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<PutOutcome> {
        let response = self
            .http
            .post(format!("{}/put", self.base))
            .json(&PutRequest {
                key: key.to_string(),
                value: value.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("put request to {} failed", self.base))?;

        match response.status() {
            StatusCode::OK => {
                let body: PutResponse = response.json().await.context("decoding put response")?;
                Ok(PutOutcome::Ok { acks: body.acks })
            }
            StatusCode::GATEWAY_TIMEOUT => Ok(PutOutcome::Timeout),
            StatusCode::INTERNAL_SERVER_ERROR => {
                let body: ErrorBody = response.json().await.context("decoding put error")?;
                Ok(PutOutcome::QuorumNotReached {
                    acks: body.acks.unwrap_or_default(),
                })
            }
            status => bail!("put rejected with status {status}: {}", error_text(response).await),
        }
    }

    pub async fn get(&self, key: &str) -> Result<GetOutcome> {
        let response = self
            .http
            .get(format!("{}/get", self.base))
            .query(&[("key", key)])
            .send()
            .await
            .with_context(|| format!("get request to {} failed", self.base))?;

        match response.status() {
            StatusCode::OK => {
                let body: ReadResponse = response.json().await.context("decoding get response")?;
                Ok(GetOutcome::Found(body.into()))
            }
            StatusCode::NOT_FOUND => Ok(GetOutcome::NotFound),
            StatusCode::GATEWAY_TIMEOUT => Ok(GetOutcome::Timeout),
            StatusCode::INTERNAL_SERVER_ERROR => {
                let body: ErrorBody = response.json().await.context("decoding get error")?;
                Ok(GetOutcome::QuorumNotReached {
                    acks: body.acks.unwrap_or_default(),
                })
            }
            status => bail!("get rejected with status {status}: {}", error_text(response).await),
        }
    }

    pub async fn status(&self) -> Result<NodeStatus> {
        self.http
            .get(format!("{}/status", self.base))
            .send()
            .await
            .with_context(|| format!("status request to {} failed", self.base))?
            .error_for_status()?
            .json()
            .await
            .context("decoding status response")
    }
}

async fn error_text(response: reqwest::Response) -> String {
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => "<no error body>".to_string(),
    }
}
