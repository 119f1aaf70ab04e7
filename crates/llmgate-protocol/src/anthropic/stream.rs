use serde::{Deserialize, Serialize};

use crate::anthropic::error::ErrorDetail;
use crate::anthropic::types::{MessageRole, MessageResponseType, StopReason};
use crate::{JsonObject, JsonValue};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
}

/// Skeleton message carried by `message_start`; content arrives as deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub r#type: MessageResponseType,
    pub role: MessageRole,
    pub model: String,
    pub content: Vec<StreamContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    pub usage: StreamUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: JsonObject,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamContentBlockDelta {
    TextDelta {
        text: String,
    },
    /// Partial JSON string; accumulate until content_block_stop.
    InputJsonDelta {
        partial_json: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMessageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: StreamMessage,
    },
    ContentBlockStart {
        index: u32,
        content_block: StreamContentBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: StreamContentBlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: StreamMessageDelta,
        usage: StreamUsage,
    },
    MessageStop,
    Ping,
    Error {
        error: ErrorDetail,
    },
}

impl StreamEvent {
    /// SSE event name for the named-event framing this dialect uses.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Ping => "ping",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Wire-level stream event. Event or delta types this crate does not
/// model fall through to `Unknown` and are carried verbatim instead of
/// failing the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[allow(clippy::large_enum_variant)]
pub enum RawStreamEvent {
    Known(StreamEvent),
    Unknown(JsonValue),
}

impl RawStreamEvent {
    pub fn event_name(&self) -> &str {
        match self {
            RawStreamEvent::Known(event) => event.event_name(),
            RawStreamEvent::Unknown(value) => value
                .get("type")
                .and_then(JsonValue::as_str)
                .unwrap_or("message"),
        }
    }

    pub fn is_message_stop(&self) -> bool {
        matches!(self, RawStreamEvent::Known(StreamEvent::MessageStop))
    }
}

impl From<StreamEvent> for RawStreamEvent {
    fn from(event: StreamEvent) -> Self {
        RawStreamEvent::Known(event)
    }
}
