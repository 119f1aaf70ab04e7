use std::collections::BTreeMap;

use llmgate_common::Dialect;
use llmgate_protocol::anthropic::{
    MessageResponseType, MessageRole, StopReason, StreamContentBlock, StreamContentBlockDelta,
    StreamEvent, StreamMessage, StreamMessageDelta, StreamUsage,
};
use llmgate_protocol::openai::stream::{ChatCompletionChunk, ToolCallChunk};
use llmgate_protocol::sse::DONE_MARKER;

use super::map_finish_reason;
use crate::TranslateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Text,
    ToolUse,
}

#[derive(Debug, Clone)]
struct ToolBlock {
    block_index: u32,
    id: String,
    name: String,
}

/// Accumulator for one provider stream. Chat completions interleave
/// role/content/tool-call fragments inside anonymous chunks; the client
/// dialect wants explicitly bracketed content blocks. This state tracks
/// the currently open block and the provider's tool-call indices so
/// fragments re-emit under stable client block indices, in arrival order.
#[derive(Debug, Default)]
pub struct OpenAIToAnthropicStreamState {
    started: bool,
    finished: bool,
    next_index: u32,
    open_block: Option<OpenBlock>,
    /// Provider tool-call index -> client block state. Identity is
    /// retained so a tool resumed after its block closed can continue
    /// under a fresh block.
    tool_blocks: BTreeMap<u32, ToolBlock>,
    usage: StreamUsage,
    stop_reason: Option<StopReason>,
}

impl OpenAIToAnthropicStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &str) -> Result<Vec<StreamEvent>, TranslateError> {
        if data == DONE_MARKER {
            return Ok(self.close());
        }
        if self.finished {
            return Ok(Vec::new());
        }

        let chunk: ChatCompletionChunk =
            serde_json::from_str(data).map_err(|source| TranslateError::MalformedEvent {
                dialect: Dialect::OpenAI,
                source,
            })?;

        if let Some(usage) = chunk.usage {
            self.usage = StreamUsage {
                input_tokens: Some(usage.prompt_tokens),
                output_tokens: Some(usage.completion_tokens),
            };
        }

        let mut events = Vec::new();
        if !self.started {
            self.started = true;
            events.push(StreamEvent::MessageStart {
                message: StreamMessage {
                    id: chunk.id.clone(),
                    r#type: MessageResponseType::Message,
                    role: MessageRole::Assistant,
                    model: chunk.model.clone(),
                    content: Vec::new(),
                    stop_reason: None,
                    stop_sequence: None,
                    usage: self.usage.clone(),
                },
            });
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(events);
        };

        if let Some(text) = choice.delta.content
            && !text.is_empty()
        {
            self.ensure_text_block(&mut events);
            events.push(StreamEvent::ContentBlockDelta {
                index: self.current_index(),
                delta: StreamContentBlockDelta::TextDelta { text },
            });
        }

        for call in choice.delta.tool_calls.unwrap_or_default() {
            self.push_tool_chunk(call, &mut events);
        }

        if let Some(reason) = choice.finish_reason {
            self.stop_reason = Some(map_finish_reason(reason));
        }

        Ok(events)
    }

    /// Close the stream: stop any open block, emit the terminal
    /// `message_delta` and `message_stop`. Idempotent.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.close()
    }

    fn close(&mut self) -> Vec<StreamEvent> {
        if self.finished || !self.started {
            self.finished = true;
            return Vec::new();
        }
        self.finished = true;
        let mut events = Vec::new();
        self.stop_open_block(&mut events);
        events.push(StreamEvent::MessageDelta {
            delta: StreamMessageDelta {
                stop_reason: Some(self.stop_reason.unwrap_or(StopReason::EndTurn)),
                stop_sequence: None,
            },
            usage: self.usage.clone(),
        });
        events.push(StreamEvent::MessageStop);
        events
    }

    fn push_tool_chunk(&mut self, call: ToolCallChunk, events: &mut Vec<StreamEvent>) {
        if !self.tool_blocks.contains_key(&call.index) {
            let (id, name) = match &call.function {
                Some(function) => (
                    call.id.clone().unwrap_or_default(),
                    function.name.clone().unwrap_or_default(),
                ),
                None => (call.id.clone().unwrap_or_default(), String::new()),
            };
            let block_index = self.open_tool_block(&id, &name, events);
            self.tool_blocks.insert(
                call.index,
                ToolBlock {
                    block_index,
                    id,
                    name,
                },
            );
        } else if !self.tool_block_is_open(call.index) {
            // The provider resumed this tool after its block closed.
            // Deltas must never target a stopped index, so continue
            // under a fresh block with the same identity.
            let ToolBlock { id, name, .. } = self.tool_blocks[&call.index].clone();
            let block_index = self.open_tool_block(&id, &name, events);
            if let Some(block) = self.tool_blocks.get_mut(&call.index) {
                block.block_index = block_index;
            }
        }

        if let Some(arguments) = call.function.and_then(|f| f.arguments)
            && !arguments.is_empty()
        {
            let index = self.tool_blocks[&call.index].block_index;
            events.push(StreamEvent::ContentBlockDelta {
                index,
                delta: StreamContentBlockDelta::InputJsonDelta {
                    partial_json: arguments,
                },
            });
        }
    }

    fn open_tool_block(&mut self, id: &str, name: &str, events: &mut Vec<StreamEvent>) -> u32 {
        self.stop_open_block(events);
        let index = self.next_index;
        self.next_index += 1;
        self.open_block = Some(OpenBlock::ToolUse);
        events.push(StreamEvent::ContentBlockStart {
            index,
            content_block: StreamContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input: Default::default(),
            },
        });
        index
    }

    fn tool_block_is_open(&self, provider_index: u32) -> bool {
        self.open_block == Some(OpenBlock::ToolUse)
            && self
                .tool_blocks
                .get(&provider_index)
                .is_some_and(|block| block.block_index == self.current_index())
    }

    fn ensure_text_block(&mut self, events: &mut Vec<StreamEvent>) {
        if self.open_block == Some(OpenBlock::Text) {
            return;
        }
        self.stop_open_block(events);
        self.open_block = Some(OpenBlock::Text);
        events.push(StreamEvent::ContentBlockStart {
            index: self.next_index,
            content_block: StreamContentBlock::Text {
                text: String::new(),
            },
        });
        self.next_index += 1;
    }

    fn current_index(&self) -> u32 {
        self.next_index.saturating_sub(1)
    }

    fn stop_open_block(&mut self, events: &mut Vec<StreamEvent>) {
        if self.open_block.take().is_some() {
            events.push(StreamEvent::ContentBlockStop {
                index: self.current_index(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(state: &mut OpenAIToAnthropicStreamState, data: &str) -> Vec<StreamEvent> {
        state.push(data).unwrap()
    }

    #[test]
    fn text_stream_brackets_one_block() {
        let mut state = OpenAIToAnthropicStreamState::new();
        let mut events = Vec::new();
        events.extend(push(
            &mut state,
            r#"{"id":"c1","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
        ));
        events.extend(push(
            &mut state,
            r#"{"id":"c1","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"content":"lo"}}]}"#,
        ));
        events.extend(push(
            &mut state,
            r#"{"id":"c1","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":4,"completion_tokens":2,"total_tokens":6}}"#,
        ));
        events.extend(push(&mut state, DONE_MARKER));

        let names: Vec<_> = events.iter().map(StreamEvent::event_name).collect();
        assert_eq!(
            names,
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        match &events[5] {
            StreamEvent::MessageDelta { delta, usage } => {
                assert_eq!(delta.stop_reason, Some(StopReason::EndTurn));
                assert_eq!(usage.input_tokens, Some(4));
                assert_eq!(usage.output_tokens, Some(2));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn tool_call_fragments_accumulate_under_one_block() {
        let mut state = OpenAIToAnthropicStreamState::new();
        let mut events = Vec::new();
        events.extend(push(
            &mut state,
            r#"{"id":"c2","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"tool_calls":[
                    {"index":0,"id":"call_7","type":"function",
                     "function":{"name":"get_weather","arguments":""}}]}}]}"#,
        ));
        events.extend(push(
            &mut state,
            r#"{"id":"c2","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"tool_calls":[
                    {"index":0,"function":{"arguments":"{\"city\":"}}]}}]}"#,
        ));
        events.extend(push(
            &mut state,
            r#"{"id":"c2","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"tool_calls":[
                    {"index":0,"function":{"arguments":"\"Berlin\"}"}}]}}],
                "usage":null}"#,
        ));
        events.extend(push(
            &mut state,
            r#"{"id":"c2","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        ));
        events.extend(push(&mut state, DONE_MARKER));

        let start = events
            .iter()
            .find_map(|event| match event {
                StreamEvent::ContentBlockStart {
                    content_block: StreamContentBlock::ToolUse { id, name, .. },
                    ..
                } => Some((id.clone(), name.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(start, ("call_7".to_string(), "get_weather".to_string()));

        let fragments: String = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::ContentBlockDelta {
                    delta: StreamContentBlockDelta::InputJsonDelta { partial_json },
                    ..
                } => Some(partial_json.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(fragments, "{\"city\":\"Berlin\"}");

        match events.iter().rev().nth(1).unwrap() {
            StreamEvent::MessageDelta { delta, .. } => {
                assert_eq!(delta.stop_reason, Some(StopReason::ToolUse));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(events.last(), Some(StreamEvent::MessageStop)));
    }

    #[test]
    fn text_then_tool_uses_distinct_indices() {
        let mut state = OpenAIToAnthropicStreamState::new();
        let mut events = Vec::new();
        events.extend(push(
            &mut state,
            r#"{"id":"c3","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"content":"thinking"}}]}"#,
        ));
        events.extend(push(
            &mut state,
            r#"{"id":"c3","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"tool_calls":[
                    {"index":0,"id":"call_1","function":{"name":"f","arguments":"{}"}}]}}]}"#,
        ));
        events.extend(push(&mut state, DONE_MARKER));

        let mut starts = events.iter().filter_map(|event| match event {
            StreamEvent::ContentBlockStart { index, .. } => Some(*index),
            _ => None,
        });
        assert_eq!(starts.next(), Some(0));
        assert_eq!(starts.next(), Some(1));
        let stops: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::ContentBlockStop { index } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(stops, vec![0, 1]);
    }

    #[test]
    fn message_start_carries_first_chunk_usage() {
        let mut state = OpenAIToAnthropicStreamState::new();
        let events = push(
            &mut state,
            r#"{"id":"c6","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"role":"assistant","content":"hi"}}],
                "usage":{"prompt_tokens":9,"completion_tokens":0,"total_tokens":9}}"#,
        );
        match &events[0] {
            StreamEvent::MessageStart { message } => {
                assert_eq!(message.usage.input_tokens, Some(9));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn resumed_tool_arguments_never_target_a_stopped_block() {
        let mut state = OpenAIToAnthropicStreamState::new();
        let mut events = Vec::new();
        events.extend(push(
            &mut state,
            r#"{"id":"c7","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"tool_calls":[
                    {"index":0,"id":"call_3","function":{"name":"f","arguments":"{\"a\":"}}]}}]}"#,
        ));
        events.extend(push(
            &mut state,
            r#"{"id":"c7","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"content":"interlude"}}]}"#,
        ));
        events.extend(push(
            &mut state,
            r#"{"id":"c7","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"tool_calls":[
                    {"index":0,"function":{"arguments":"1}"}}]}}]}"#,
        ));
        events.extend(push(&mut state, DONE_MARKER));

        // Every delta must reference a block that is open at that point.
        let mut open = None;
        for event in &events {
            match event {
                StreamEvent::ContentBlockStart { index, .. } => open = Some(*index),
                StreamEvent::ContentBlockStop { index } => {
                    assert_eq!(open, Some(*index));
                    open = None;
                }
                StreamEvent::ContentBlockDelta { index, .. } => assert_eq!(open, Some(*index)),
                _ => {}
            }
        }

        // The resumed fragment reopened the tool under the same identity.
        let tool_starts: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::ContentBlockStart {
                    index,
                    content_block: StreamContentBlock::ToolUse { id, name, .. },
                } => Some((*index, id.clone(), name.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(tool_starts.len(), 2);
        assert_eq!(tool_starts[0].1, tool_starts[1].1);
        assert_eq!(tool_starts[0].2, tool_starts[1].2);
        assert_ne!(tool_starts[0].0, tool_starts[1].0);
    }

    #[test]
    fn close_is_idempotent() {
        let mut state = OpenAIToAnthropicStreamState::new();
        push(
            &mut state,
            r#"{"id":"c4","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"content":"x"}}]}"#,
        );
        let first = state.finish();
        assert!(!first.is_empty());
        assert!(state.finish().is_empty());
        assert!(state.push(DONE_MARKER).unwrap().is_empty());
    }

    #[test]
    fn events_after_done_are_dropped() {
        let mut state = OpenAIToAnthropicStreamState::new();
        push(
            &mut state,
            r#"{"id":"c5","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"content":"x"}}]}"#,
        );
        push(&mut state, DONE_MARKER);
        let late = push(
            &mut state,
            r#"{"id":"c5","object":"chat.completion.chunk","created":0,"model":"m",
                "choices":[{"index":0,"delta":{"content":"late"}}]}"#,
        );
        assert!(late.is_empty());
    }
}
