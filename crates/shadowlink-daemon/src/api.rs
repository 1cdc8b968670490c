//! REST API handlers

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shadowlink_proxy::{Operation, Reply, Request};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::state::AppState;

/// Header carrying the resource status in `class.detail` form
pub const STATUS_HEADER: &str = "x-shadowlink-status";

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// List published resources
pub async fn list_resources(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.resources().await)
}

/// List discovered devices
pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.devices().await)
}

/// List devices admitted to the D2D server list
pub async fn list_servers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.servers().await)
}

/// Trigger a discovery scan
pub async fn trigger_scan(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("Manual scan triggered");

    match state.scan().await {
        Ok(found) => Json(serde_json::json!({
            "status": "completed",
            "resources_found": found,
            "shadows": state.engine.tree.len().await,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Scan failed: {}", e))),
        )
            .into_response(),
    }
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.clone())
}

fn operation_for(method: &Method) -> Option<Operation> {
    match *method {
        Method::GET => Some(Operation::Retrieve),
        Method::POST | Method::PUT => Some(Operation::Update),
        Method::DELETE => Some(Operation::Delete),
        _ => None,
    }
}

/// Serve any other path from the resource tree
pub async fn dispatch_resource(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let Some(operation) = operation_for(&method) else {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(ApiError::new(format!("Unsupported method {method}"))),
        )
            .into_response();
    };

    let payload = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiError::new(format!("Invalid JSON body: {}", e))),
                )
                    .into_response()
            }
        }
    };

    let mut request = Request::new(uri.path(), operation);
    request.query = query;
    request.payload = payload;

    debug!(path = %uri.path(), operation = ?operation, "Dispatching resource request");
    let reply = state.engine.dispatch(request).await.resolve().await;
    reply_to_response(reply)
}

fn reply_to_response(reply: Reply) -> Response {
    let status = StatusCode::from_u16(reply.status.to_http()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = if serde_json::from_slice::<serde::de::IgnoredAny>(&reply.payload).is_ok() {
        "application/json"
    } else {
        "application/octet-stream"
    };

    let mut response = (status, [(header::CONTENT_TYPE, content_type)], reply.payload).into_response();
    if let Ok(value) = HeaderValue::from_str(&reply.status.to_string()) {
        response.headers_mut().insert(STATUS_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowlink_core::Status;

    #[test]
    fn test_operation_for() {
        assert_eq!(operation_for(&Method::GET), Some(Operation::Retrieve));
        assert_eq!(operation_for(&Method::PUT), Some(Operation::Update));
        assert_eq!(operation_for(&Method::POST), Some(Operation::Update));
        assert_eq!(operation_for(&Method::DELETE), Some(Operation::Delete));
        assert_eq!(operation_for(&Method::PATCH), None);
    }

    #[test]
    fn test_reply_to_response() {
        let response = reply_to_response(Reply::new(Status::CONTENT, b"{\"a\":1}".to_vec()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[STATUS_HEADER], "2.05");

        let response = reply_to_response(Reply::new(Status::CONTENT, vec![0xa1, 0x00]));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");

        let response = reply_to_response(Reply::empty(Status::REQUEST_ENTITY_TOO_LARGE));
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()[STATUS_HEADER], "4.13");

        let response = reply_to_response(Reply::empty(Status::GATEWAY_TIMEOUT));
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
