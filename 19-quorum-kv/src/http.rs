//! HTTP surface: client routes, peer routes and status mapping.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::{CoordinatorError, ReplicaWriteError};
use crate::node::Node;
use crate::protocol::{
    ErrorBody, KeyQuery, PutRequest, PutResponse, ReadResponse, ReplicaWriteRequest,
    ReplicaWriteResponse,
};

type SharedNode = Arc<Node>;

pub fn router(node: SharedNode) -> Router {
    Router::new()
        .route("/put", post(put).fallback(post_only))
        .route("/get", get(get_value))
        .route("/internal/write", post(internal_write).fallback(post_only))
        .route("/internal/read", get(internal_read))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

/// Every way a request can fail, mapped onto a status and a JSON body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    MethodNotAllowed,
    Coordinator(CoordinatorError),
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        ApiError::Coordinator(err)
    }
}

impl From<ReplicaWriteError> for ApiError {
    fn from(err: ReplicaWriteError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "rejecting request body");
        ApiError::BadRequest("Unable to decode body".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorBody::new(message)),
            ApiError::NotFound => (StatusCode::NOT_FOUND, ErrorBody::new("not found")),
            ApiError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, ErrorBody::new("POST only"))
            }
            ApiError::Coordinator(CoordinatorError::QuorumNotReached { acks }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::with_acks("quorum not reached", acks),
            ),
            ApiError::Coordinator(CoordinatorError::Timeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, ErrorBody::new("timeout"))
            }
        };
        (status, Json(body)).into_response()
    }
}

async fn post_only() -> ApiError {
    ApiError::MethodNotAllowed
}

fn required_key(query: KeyQuery) -> Result<String, ApiError> {
    match query.key {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(ApiError::BadRequest("missing key".to_string())),
    }
}

async fn put(
    State(node): State<SharedNode>,
    body: Result<Json<PutRequest>, JsonRejection>,
) -> Result<Json<PutResponse>, ApiError> {
    let Json(request) = body?;
    if request.key.is_empty() {
        return Err(ApiError::BadRequest("missing key".to_string()));
    }
    let ack = node.put(request.key, request.value).await?;
    Ok(Json(PutResponse::ok(ack.acks)))
}

async fn get_value(
    State(node): State<SharedNode>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<ReadResponse>, ApiError> {
    let key = required_key(query)?;
    let outcome = node.get(&key).await?;
    outcome
        .value
        .map(|value| Json(value.into()))
        .ok_or(ApiError::NotFound)
}

async fn internal_write(
    State(node): State<SharedNode>,
    body: Result<Json<ReplicaWriteRequest>, JsonRejection>,
) -> Result<Json<ReplicaWriteResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        warn!(error = %rejection, "undecodable replica write");
        ApiError::from(rejection)
    })?;
    let applied = node.apply_replica_write(request)?;
    Ok(Json(ReplicaWriteResponse {
        result: "ok".to_string(),
        applied,
    }))
}

async fn internal_read(
    State(node): State<SharedNode>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<ReadResponse>, ApiError> {
    let key = required_key(query)?;
    node.local_value(&key)
        .map(|value| Json(value.into()))
        .ok_or(ApiError::NotFound)
}

async fn status(State(node): State<SharedNode>) -> impl IntoResponse {
    Json(node.status())
}
