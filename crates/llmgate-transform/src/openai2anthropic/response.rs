use llmgate_protocol::anthropic::{
    ContentBlock, MessageResponse, MessageResponseType, MessageRole, Usage,
};
use llmgate_protocol::openai::{ChatCompletionResponse, ToolCall};

use super::map_finish_reason;
use crate::TranslateError;

/// Normalize a complete chat completions response into the client
/// dialect. Only the first choice is used; the gateway never requests
/// multiple candidates.
pub fn translate(response: ChatCompletionResponse) -> Result<MessageResponse, TranslateError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(TranslateError::EmptyResponse)?;

    let mut content = Vec::new();
    if let Some(text) = choice.message.content
        && !text.is_empty()
    {
        content.push(ContentBlock::Text { text });
    }
    for call in choice.message.tool_calls.unwrap_or_default() {
        content.push(map_tool_call(call)?);
    }

    Ok(MessageResponse {
        id: response.id,
        r#type: MessageResponseType::Message,
        role: MessageRole::Assistant,
        model: response.model,
        content,
        stop_reason: choice.finish_reason.map(map_finish_reason),
        stop_sequence: None,
        usage: response
            .usage
            .map(|usage| Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            })
            .unwrap_or_default(),
    })
}

fn map_tool_call(call: ToolCall) -> Result<ContentBlock, TranslateError> {
    let input = if call.function.arguments.trim().is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(&call.function.arguments)
            .map_err(|_| TranslateError::MalformedToolArguments { id: call.id.clone() })?
    };
    Ok(ContentBlock::ToolUse {
        id: call.id,
        name: call.function.name,
        input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_protocol::anthropic::StopReason;
    use llmgate_protocol::openai::{
        ChatChoice, ChatRole, CompletionUsage, FinishReason, FunctionCall, ResponseMessage,
        ToolType,
    };

    fn provider_response(message: ResponseMessage, finish: FinishReason) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: "chatcmpl-42".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "gpt-3.5-turbo".to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message,
                finish_reason: Some(finish),
            }],
            usage: Some(CompletionUsage {
                prompt_tokens: 7,
                completion_tokens: 3,
                total_tokens: 10,
            }),
        }
    }

    #[test]
    fn text_and_tool_calls_normalize_in_order() {
        let message = ResponseMessage {
            role: ChatRole::Assistant,
            content: Some("let me check".to_string()),
            tool_calls: Some(vec![ToolCall {
                id: "call_9".to_string(),
                r#type: ToolType::Function,
                function: FunctionCall {
                    name: "get_weather".to_string(),
                    arguments: "{\"city\":\"Berlin\"}".to_string(),
                },
            }]),
        };
        let out = translate(provider_response(message, FinishReason::ToolCalls)).unwrap();
        assert_eq!(out.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(out.content.len(), 2);
        assert!(matches!(out.content[0], ContentBlock::Text { .. }));
        assert!(matches!(
            out.content[1],
            ContentBlock::ToolUse { ref id, .. } if id == "call_9"
        ));
        assert_eq!(out.usage.input_tokens, 7);
        assert_eq!(out.usage.output_tokens, 3);
    }

    #[test]
    fn translation_is_deterministic() {
        let message = ResponseMessage {
            role: ChatRole::Assistant,
            content: Some("ok".to_string()),
            tool_calls: None,
        };
        let a = translate(provider_response(message.clone(), FinishReason::Stop)).unwrap();
        let b = translate(provider_response(message, FinishReason::Stop)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_tool_arguments_surface_as_error() {
        let message = ResponseMessage {
            role: ChatRole::Assistant,
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: "call_bad".to_string(),
                r#type: ToolType::Function,
                function: FunctionCall {
                    name: "f".to_string(),
                    arguments: "{not json".to_string(),
                },
            }]),
        };
        let err = translate(provider_response(message, FinishReason::ToolCalls)).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::MalformedToolArguments { ref id } if id == "call_bad"
        ));
    }

    #[test]
    fn empty_choice_list_is_an_error() {
        let response = ChatCompletionResponse {
            id: "x".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "m".to_string(),
            choices: Vec::new(),
            usage: None,
        };
        assert!(matches!(translate(response), Err(TranslateError::EmptyResponse)));
    }
}
