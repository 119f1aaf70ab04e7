use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use llmgate_protocol::anthropic::{CreateMessageRequestBody, ErrorResponse, ErrorType};
use llmgate_protocol::sse::encode_named_event;

use crate::dispatch::{DispatchReply, Dispatcher};
use crate::error::GatewayError;
use crate::store::ConfigStore;

/// Header a client sets to force a routing slot for one request.
pub const ROUTE_OVERRIDE_HEADER: &str = "x-llmgate-route";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub dispatcher: Arc<Dispatcher>,
}

pub fn gateway_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/v1/messages", post(create_message))
        .route("/", get(health))
        .route("/health", get(health))
        .route("/reload", post(reload))
        .with_state(state)
}

async fn create_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();

    let request: CreateMessageRequestBody = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return GatewayError::BadRequest(err).into_response(),
    };
    let slot_override = headers
        .get(ROUTE_OVERRIDE_HEADER)
        .and_then(|value| value.to_str().ok());

    let reply = state
        .dispatcher
        .dispatch(&trace_id, request, slot_override)
        .await;

    match reply {
        Ok(DispatchReply::Complete(response)) => {
            info!(
                trace_id = %trace_id,
                model = %response.model,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
            Json(response).into_response()
        }
        Ok(DispatchReply::Stream(events)) => {
            info!(
                trace_id = %trace_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stream opened"
            );
            let frames = ReceiverStream::new(events)
                .filter_map(|event| async move { encode_named_event(event.event_name(), &event) })
                .map(Ok::<_, Infallible>);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Body::from_stream(frames))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(err) => {
            warn!(
                trace_id = %trace_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "request failed"
            );
            err.into_response()
        }
    }
}

async fn health() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

/// Re-read the config source. On failure the previous snapshot stays
/// active and the caller gets the validation error.
async fn reload(State(state): State<AppState>) -> Response {
    match state.store.reload() {
        Ok(()) => Json(json!({"reloaded": true})).into_response(),
        Err(err) => {
            warn!(error = %err, "config reload rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    ErrorType::InvalidRequestError,
                    err.to_string(),
                )),
            )
                .into_response()
        }
    }
}
