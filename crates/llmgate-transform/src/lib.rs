//! Bidirectional translation between the client-facing Anthropic dialect
//! and each provider dialect. Dispatch is table-driven on the closed
//! [`Dialect`] tag: one module per dialect pair, no per-provider
//! branching at call sites.

use llmgate_common::Dialect;
use llmgate_protocol::anthropic::{CreateMessageRequestBody, MessageResponse, RawStreamEvent};
use llmgate_protocol::openai::ChatCompletionRequestBody;

pub mod anthropic2openai;
pub mod openai2anthropic;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("provider response is not valid {dialect:?} JSON: {source}")]
    MalformedResponse {
        dialect: Dialect,
        #[source]
        source: serde_json::Error,
    },
    #[error("provider stream event is not valid {dialect:?} JSON: {source}")]
    MalformedEvent {
        dialect: Dialect,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool call {id} carries unparseable arguments")]
    MalformedToolArguments { id: String },
    #[error("provider response contained no choices")]
    EmptyResponse,
}

/// Outbound payload in the target provider's schema.
#[derive(Debug, Clone)]
pub enum ProviderRequest {
    OpenAI(ChatCompletionRequestBody),
    Anthropic(CreateMessageRequestBody),
}

impl ProviderRequest {
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            ProviderRequest::OpenAI(body) => serde_json::to_vec(body),
            ProviderRequest::Anthropic(body) => serde_json::to_vec(body),
        }
    }
}

/// Build the outbound provider request for `dialect`, with the routed
/// `model` substituted for the client's model hint.
pub fn to_provider_request(
    dialect: Dialect,
    body: &CreateMessageRequestBody,
    model: &str,
    streaming: bool,
) -> Result<ProviderRequest, TranslateError> {
    match dialect {
        Dialect::OpenAI => Ok(ProviderRequest::OpenAI(
            anthropic2openai::request::translate(body, model, streaming)?,
        )),
        Dialect::Anthropic => {
            let mut body = body.clone();
            body.model = model.to_string();
            body.stream = streaming.then_some(true);
            Ok(ProviderRequest::Anthropic(body))
        }
    }
}

/// Normalize a complete (non-streamed) provider response body into the
/// client dialect.
pub fn from_provider_response(
    dialect: Dialect,
    raw: &[u8],
) -> Result<MessageResponse, TranslateError> {
    match dialect {
        Dialect::OpenAI => {
            let response =
                serde_json::from_slice(raw).map_err(|source| TranslateError::MalformedResponse {
                    dialect,
                    source,
                })?;
            openai2anthropic::response::translate(response)
        }
        Dialect::Anthropic => {
            serde_json::from_slice(raw).map_err(|source| TranslateError::MalformedResponse {
                dialect,
                source,
            })
        }
    }
}

/// Per-stream translation state. Created at stream start, fed one decoded
/// SSE data payload at a time, dropped when the stream ends or errors.
pub enum StreamTranslator {
    OpenAI(openai2anthropic::stream::OpenAIToAnthropicStreamState),
    Anthropic,
}

impl StreamTranslator {
    pub fn new(dialect: Dialect) -> Self {
        match dialect {
            Dialect::OpenAI => {
                StreamTranslator::OpenAI(openai2anthropic::stream::OpenAIToAnthropicStreamState::new())
            }
            Dialect::Anthropic => StreamTranslator::Anthropic,
        }
    }

    /// Translate one provider event payload into zero or more client
    /// events, preserving relative order. Event types the passthrough
    /// does not model are forwarded verbatim, not rejected.
    pub fn push(&mut self, data: &str) -> Result<Vec<RawStreamEvent>, TranslateError> {
        match self {
            StreamTranslator::OpenAI(state) => Ok(state
                .push(data)?
                .into_iter()
                .map(RawStreamEvent::Known)
                .collect()),
            StreamTranslator::Anthropic => {
                let event: RawStreamEvent = serde_json::from_str(data).map_err(|source| {
                    TranslateError::MalformedEvent {
                        dialect: Dialect::Anthropic,
                        source,
                    }
                })?;
                Ok(vec![event])
            }
        }
    }

    /// Flush at end of provider stream; closes any block still open and
    /// guarantees a terminal `message_stop`.
    pub fn finish(&mut self) -> Vec<RawStreamEvent> {
        match self {
            StreamTranslator::OpenAI(state) => state
                .finish()
                .into_iter()
                .map(RawStreamEvent::Known)
                .collect(),
            StreamTranslator::Anthropic => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_protocol::anthropic::{
        ContentBlock, MessageResponseType, MessageRole, StopReason, Usage,
    };

    #[test]
    fn already_normalized_response_passes_through_unchanged() {
        let response = MessageResponse {
            id: "msg_01".to_string(),
            r#type: MessageResponseType::Message,
            role: MessageRole::Assistant,
            model: "claude-3-haiku".to_string(),
            content: vec![
                ContentBlock::Text {
                    text: "done".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "get_weather".to_string(),
                    input: serde_json::json!({"city": "Berlin"}),
                },
            ],
            stop_reason: Some(StopReason::ToolUse),
            stop_sequence: None,
            usage: Usage {
                input_tokens: 11,
                output_tokens: 5,
            },
        };
        let raw = serde_json::to_vec(&response).unwrap();
        let back = from_provider_response(Dialect::Anthropic, &raw).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn passthrough_forwards_unmodeled_event_types() {
        let mut translator = StreamTranslator::new(Dialect::Anthropic);
        let events = translator
            .push(r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"hm"}}"#)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RawStreamEvent::Unknown(_)));
        assert_eq!(events[0].event_name(), "content_block_delta");
    }

    #[test]
    fn passthrough_rejects_non_json_payloads() {
        let mut translator = StreamTranslator::new(Dialect::Anthropic);
        assert!(matches!(
            translator.push("not json"),
            Err(TranslateError::MalformedEvent { .. })
        ));
    }
}
