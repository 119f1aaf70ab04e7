use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{info, warn};

use llmgate_common::{Config, Dialect};
use llmgate_protocol::anthropic::{
    CreateMessageRequestBody, ErrorDetail, ErrorType, MessageResponse, RawStreamEvent, StreamEvent,
};
use llmgate_protocol::sse::SseDecoder;
use llmgate_transform::{StreamTranslator, from_provider_response, to_provider_request};

use crate::error::GatewayError;
use crate::router::{RouteDecision, select};
use crate::store::ConfigStore;
use crate::upstream::{UpstreamBody, UpstreamClient, UpstreamRequest};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const RETRY_BACKOFF: Duration = Duration::from_millis(200);
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Outcome of one dispatched request, already in the client dialect.
pub enum DispatchReply {
    Complete(Box<MessageResponse>),
    Stream(mpsc::Receiver<RawStreamEvent>),
}

/// Runs the whole per-request pipeline: route, translate out, call the
/// provider, translate back. One config snapshot is captured up front
/// and used for every step, fallbacks included.
pub struct Dispatcher {
    store: Arc<ConfigStore>,
    client: Arc<dyn UpstreamClient>,
    retry_backoff: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<ConfigStore>, client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            store,
            client,
            retry_backoff: RETRY_BACKOFF,
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub async fn dispatch(
        &self,
        trace_id: &str,
        body: CreateMessageRequestBody,
        slot_override: Option<&str>,
    ) -> Result<DispatchReply, GatewayError> {
        let snapshot = self.store.current();
        let streaming = body.stream == Some(true);
        let primary = select(&snapshot, &body.model, slot_override)?;

        if streaming {
            let receiver = self.dispatch_stream(trace_id, &body, &primary).await?;
            return Ok(DispatchReply::Stream(receiver));
        }

        let mut candidates = vec![primary];
        for slot in &snapshot.fallback_chain {
            if let Some(decision) = resolve_fallback(&snapshot, slot)
                && !candidates.contains(&decision)
            {
                candidates.push(decision);
            }
        }

        let mut last_err = None;
        for decision in &candidates {
            match self.dispatch_once_with_retry(trace_id, &body, decision).await {
                Ok(response) => return Ok(DispatchReply::Complete(Box::new(response))),
                Err(err) => {
                    warn!(
                        trace_id = %trace_id,
                        provider = %decision.provider.name,
                        model = %decision.model,
                        error = %err,
                        "candidate failed"
                    );
                    last_err = Some(err);
                }
            }
        }
        // At least the primary candidate ran, so last_err is set.
        Err(last_err.unwrap_or(GatewayError::StreamTerminated))
    }

    /// One non-streaming call, retried once after a short backoff when
    /// the failure was transport-level and the request is safe to replay.
    async fn dispatch_once_with_retry(
        &self,
        trace_id: &str,
        body: &CreateMessageRequestBody,
        decision: &RouteDecision,
    ) -> Result<MessageResponse, GatewayError> {
        match self.dispatch_once(body, decision).await {
            Ok(response) => Ok(response),
            Err(GatewayError::Upstream(err)) if err.is_retryable() => {
                info!(
                    trace_id = %trace_id,
                    provider = %decision.provider.name,
                    error = %err,
                    "retrying after transport failure"
                );
                tokio::time::sleep(self.retry_backoff).await;
                self.dispatch_once(body, decision).await
            }
            Err(err) => Err(err),
        }
    }

    async fn dispatch_once(
        &self,
        body: &CreateMessageRequestBody,
        decision: &RouteDecision,
    ) -> Result<MessageResponse, GatewayError> {
        let dialect = decision.provider.dialect;
        let payload = to_provider_request(dialect, body, &decision.model, false)?;
        let request = UpstreamRequest {
            url: decision.provider.api_base_url.clone(),
            headers: auth_headers(decision),
            body: Bytes::from(payload.to_json_bytes()?),
            is_stream: false,
        };
        let response = self.client.send(request).await?;
        let raw = match response.body {
            UpstreamBody::Bytes(bytes) => bytes,
            UpstreamBody::Stream(mut rx) => {
                let mut buf = Vec::new();
                while let Some(chunk) = rx.recv().await {
                    buf.extend_from_slice(&chunk);
                }
                Bytes::from(buf)
            }
        };
        Ok(from_provider_response(dialect, &raw)?)
    }

    /// One streaming call. No retry and no fallback: bytes may already
    /// have reached the client, so replaying is never safe.
    async fn dispatch_stream(
        &self,
        trace_id: &str,
        body: &CreateMessageRequestBody,
        decision: &RouteDecision,
    ) -> Result<mpsc::Receiver<RawStreamEvent>, GatewayError> {
        let dialect = decision.provider.dialect;
        let payload = to_provider_request(dialect, body, &decision.model, true)?;
        let request = UpstreamRequest {
            url: decision.provider.api_base_url.clone(),
            headers: auth_headers(decision),
            body: Bytes::from(payload.to_json_bytes()?),
            is_stream: true,
        };
        let response = self.client.send(request).await?;

        let (tx, rx) = mpsc::channel::<RawStreamEvent>(STREAM_CHANNEL_CAPACITY);
        let trace_id = trace_id.to_string();
        match response.body {
            UpstreamBody::Stream(upstream) => {
                tokio::spawn(relay_stream(trace_id, dialect, upstream, tx));
            }
            UpstreamBody::Bytes(bytes) => {
                // Some providers answer small streamed requests with a
                // single buffered body; relay it through the same path.
                let (body_tx, body_rx) = mpsc::channel(1);
                let _ = body_tx.try_send(bytes);
                drop(body_tx);
                tokio::spawn(relay_stream(trace_id, dialect, body_rx, tx));
            }
        }
        Ok(rx)
    }
}

fn resolve_fallback(config: &Config, slot: &str) -> Option<RouteDecision> {
    let target = config.slot(slot)?;
    let provider = config.provider(&target.provider)?;
    Some(RouteDecision {
        provider: provider.clone(),
        model: target.model.clone(),
        slot: Some(slot.to_string()),
    })
}

/// Per-dialect credential headers. These values are secrets and are
/// never logged anywhere.
fn auth_headers(decision: &RouteDecision) -> Vec<(String, String)> {
    match decision.provider.dialect {
        Dialect::OpenAI => vec![(
            "authorization".to_string(),
            format!("Bearer {}", decision.provider.api_key),
        )],
        Dialect::Anthropic => vec![
            ("x-api-key".to_string(), decision.provider.api_key.clone()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ],
    }
}

/// Decode provider SSE bytes, translate each event, and forward to the
/// client channel. If the client goes away the send fails and the task
/// returns, which drops the upstream receiver and cancels the provider
/// call. A provider stream that ends without its terminal event becomes
/// an explicit error event rather than a silent clean finish.
async fn relay_stream(
    trace_id: String,
    dialect: Dialect,
    mut upstream: mpsc::Receiver<Bytes>,
    tx: mpsc::Sender<RawStreamEvent>,
) {
    let mut decoder = SseDecoder::new();
    let mut translator = StreamTranslator::new(dialect);
    let mut saw_stop = false;

    while let Some(chunk) = upstream.recv().await {
        for sse in decoder.feed(&chunk) {
            if !forward(&trace_id, &mut translator, &sse.data, &mut saw_stop, &tx).await {
                return;
            }
        }
        if saw_stop {
            break;
        }
    }

    for sse in decoder.finish() {
        if !forward(&trace_id, &mut translator, &sse.data, &mut saw_stop, &tx).await {
            return;
        }
    }

    if !saw_stop {
        warn!(trace_id = %trace_id, "provider stream ended before its terminal event");
        let _ = tx
            .send(error_event("stream ended before the final message event"))
            .await;
    }
}

/// Returns false when relaying must stop (client gone or stream broken).
async fn forward(
    trace_id: &str,
    translator: &mut StreamTranslator,
    data: &str,
    saw_stop: &mut bool,
    tx: &mpsc::Sender<RawStreamEvent>,
) -> bool {
    let events = match translator.push(data) {
        Ok(events) => events,
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err, "dropping untranslatable stream event");
            let _ = tx.send(error_event(err.to_string())).await;
            return false;
        }
    };
    for event in events {
        if event.is_message_stop() {
            *saw_stop = true;
        }
        if tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}

fn error_event(message: impl Into<String>) -> RawStreamEvent {
    RawStreamEvent::Known(StreamEvent::Error {
        error: ErrorDetail {
            r#type: ErrorType::ApiError,
            message: message.into(),
        },
    })
}
