//! JSON bodies exchanged over HTTP, between clients and nodes and between peers.

use serde::{Deserialize, Serialize};

use crate::store::Value;

/// `POST /put` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
}

/// `POST /put` success body: `{"result":"ok","acks":n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    pub result: String,
    pub acks: usize,
}

impl PutResponse {
    pub fn ok(acks: usize) -> Self {
        Self {
            result: "ok".to_string(),
            acks,
        }
    }
}

/// Query string for `GET /get` and `GET /internal/read`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

/// A stored value as returned by reads: `{"value":..,"timestamp":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub value: String,
    pub timestamp: i64,
}

impl From<Value> for ReadResponse {
    fn from(value: Value) -> Self {
        Self {
            value: value.payload,
            timestamp: value.timestamp,
        }
    }
}

impl From<ReadResponse> for Value {
    fn from(response: ReadResponse) -> Self {
        Value::new(response.value, response.timestamp)
    }
}

/// `POST /internal/write` body sent from a coordinator to its peers.
///
/// The timestamp travels as a decimal string. Fields are optional on the
/// way in so a missing key or timestamp can be reported as a malformed
/// replica write instead of a generic decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaWriteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl ReplicaWriteRequest {
    pub fn new(key: &str, value: &Value) -> Self {
        Self {
            key: Some(key.to_string()),
            value: value.payload.clone(),
            ts: Some(value.timestamp.to_string()),
        }
    }
}

/// `POST /internal/write` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaWriteResponse {
    pub result: String,
    pub applied: bool,
}

/// Error body: `{"error":..}` with the ack count when one is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acks: Option<usize>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            acks: None,
        }
    }

    pub fn with_acks(error: impl Into<String>, acks: usize) -> Self {
        Self {
            error: error.into(),
            acks: Some(acks),
        }
    }
}

/// `GET /status` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: String,
    pub address: String,
    pub peers: Vec<String>,
    pub n: usize,
    pub w: usize,
    pub r: usize,
    pub keys: usize,
}
