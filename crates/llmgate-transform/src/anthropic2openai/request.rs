use tracing::warn;

use llmgate_protocol::anthropic::{
    ContentBlock, CreateMessageRequestBody, ImageSource, MessageContent, MessageRole, SystemPrompt,
    ToolChoice, ToolDefinition, ToolResultContent,
};
use llmgate_protocol::openai::{
    ChatCompletionRequestBody, ChatMessage, ChatRole, FunctionCall, FunctionDefinition, ImageUrl,
    MessageContentPart, NamedFunction, RequestMessageContent, Tool, ToolCall, ToolChoiceOption,
    ToolType,
};

use crate::TranslateError;

/// Map an Anthropic request body onto the chat completions schema.
///
/// Content-part order and tool-use ids are preserved; fields with no
/// chat-completions equivalent (`top_k`) are dropped with a warning,
/// never coerced.
pub fn translate(
    body: &CreateMessageRequestBody,
    model: &str,
    streaming: bool,
) -> Result<ChatCompletionRequestBody, TranslateError> {
    let mut messages = Vec::with_capacity(body.messages.len() + 1);

    if let Some(system) = &body.system {
        messages.push(ChatMessage::text(ChatRole::System, system_text(system)));
    }

    for message in &body.messages {
        match message.role {
            MessageRole::User => push_user_message(&mut messages, &message.content),
            MessageRole::Assistant => push_assistant_message(&mut messages, &message.content),
        }
    }

    if body.top_k.is_some() {
        warn!(field = "top_k", "dropping field with no target-dialect equivalent");
    }

    Ok(ChatCompletionRequestBody {
        model: model.to_string(),
        messages,
        max_tokens: Some(body.max_tokens),
        temperature: body.temperature,
        top_p: body.top_p,
        stop: body.stop_sequences.clone(),
        stream: streaming.then_some(true),
        tools: body.tools.as_ref().map(|tools| tools.iter().map(map_tool).collect()),
        tool_choice: body.tool_choice.as_ref().map(map_tool_choice),
        user: body.metadata.as_ref().and_then(|meta| meta.user_id.clone()),
    })
}

fn system_text(system: &SystemPrompt) -> String {
    match system {
        SystemPrompt::Text(text) => text.clone(),
        SystemPrompt::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// User messages split into tool results (their own `tool` role
/// messages, in block order) and everything else (one `user` message).
fn push_user_message(messages: &mut Vec<ChatMessage>, content: &MessageContent) {
    let blocks = content.clone().into_blocks();
    let mut parts = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => parts.push(MessageContentPart::Text { text }),
            ContentBlock::Image { source } => parts.push(MessageContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image_url(&source),
                },
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error: _,
            } => {
                flush_user_parts(messages, &mut parts);
                messages.push(ChatMessage {
                    role: ChatRole::Tool,
                    content: Some(RequestMessageContent::Text(tool_result_text(content))),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id),
                });
            }
            ContentBlock::ToolUse { .. } => {
                warn!(block = "tool_use", role = "user", "dropping misplaced content block");
            }
            ContentBlock::Unknown(_) => {
                warn!(role = "user", "dropping content block with no target-dialect equivalent");
            }
        }
    }
    flush_user_parts(messages, &mut parts);
}

fn flush_user_parts(messages: &mut Vec<ChatMessage>, parts: &mut Vec<MessageContentPart>) {
    if parts.is_empty() {
        return;
    }
    let content = match parts.as_slice() {
        [MessageContentPart::Text { text }] => RequestMessageContent::Text(text.clone()),
        _ => RequestMessageContent::Parts(std::mem::take(parts)),
    };
    parts.clear();
    messages.push(ChatMessage {
        role: ChatRole::User,
        content: Some(content),
        tool_calls: None,
        tool_call_id: None,
    });
}

fn push_assistant_message(messages: &mut Vec<ChatMessage>, content: &MessageContent) {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in content.clone().into_blocks() {
        match block {
            ContentBlock::Text { text: piece } => text.push_str(&piece),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                r#type: ToolType::Function,
                function: FunctionCall {
                    name,
                    arguments: input.to_string(),
                },
            }),
            other => {
                warn!(block = ?other, role = "assistant", "dropping unsupported content block");
            }
        }
    }

    messages.push(ChatMessage {
        role: ChatRole::Assistant,
        content: (!text.is_empty()).then_some(RequestMessageContent::Text(text)),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    });
}

fn tool_result_text(content: Option<ToolResultContent>) -> String {
    match content {
        None => String::new(),
        Some(ToolResultContent::Text(text)) => text,
        Some(ToolResultContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn image_url(source: &ImageSource) -> String {
    match source {
        ImageSource::Url { url } => url.clone(),
        ImageSource::Base64 { media_type, data } => {
            format!("data:{media_type};base64,{data}")
        }
    }
}

fn map_tool(tool: &ToolDefinition) -> Tool {
    Tool {
        r#type: ToolType::Function,
        function: FunctionDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: Some(tool.input_schema.clone()),
        },
    }
}

fn map_tool_choice(choice: &ToolChoice) -> ToolChoiceOption {
    match choice {
        ToolChoice::Auto => ToolChoiceOption::Mode("auto".to_string()),
        ToolChoice::Any => ToolChoiceOption::Mode("required".to_string()),
        ToolChoice::None => ToolChoiceOption::Mode("none".to_string()),
        ToolChoice::Tool { name } => ToolChoiceOption::Named {
            r#type: ToolType::Function,
            function: NamedFunction { name: name.clone() },
        },
    }
}
