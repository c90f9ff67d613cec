//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::lifecycle::Lifecycle;
use crate::engine::InferenceEngine;
use crate::error::Error;

/// Shared application state
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    /// Absent when the router runs outside a [`super::Server`]
    pub lifecycle: Option<Arc<Lifecycle>>,
}

impl AppState {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        Self {
            engine,
            lifecycle: None,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<Lifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }
}

/// Inference endpoint
///
/// Runs on the blocking pool so a slow graph never stalls the accept loop.
pub async fn infer(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let engine = Arc::clone(&state.engine);
    match tokio::task::spawn_blocking(move || engine.infer(&body)).await {
        Ok(Ok(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            tracing::error!("Inference task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "inference task failed").into_response()
        }
    }
}

/// Readiness probe
pub async fn ping() -> StatusCode {
    StatusCode::OK
}

/// Graceful shutdown trigger
pub async fn shutdown(State(state): State<Arc<AppState>>) -> Response {
    match &state.lifecycle {
        Some(lifecycle) => {
            lifecycle.trigger();
            StatusCode::OK.into_response()
        }
        None => (StatusCode::BAD_REQUEST, "server does not support shutdown").into_response(),
    }
}

/// Unknown paths
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = if self.is_request_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        tracing::warn!("Request failed ({}): {}", status.as_u16(), self);
        (status, self.to_string()).into_response()
    }
}
