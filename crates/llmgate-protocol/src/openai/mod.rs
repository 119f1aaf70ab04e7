pub mod stream;
pub mod types;

pub use stream::{ChatCompletionChunk, ChunkChoice, ChunkDelta, ToolCallChunk, ToolCallChunkFunction};
pub use types::{
    ChatChoice, ChatCompletionRequestBody, ChatCompletionResponse, ChatMessage, ChatRole,
    CompletionUsage, FinishReason, FunctionCall, FunctionDefinition, ImageUrl,
    MessageContentPart, NamedFunction, RequestMessageContent, ResponseMessage, Tool, ToolCall,
    ToolChoiceOption, ToolType,
};
