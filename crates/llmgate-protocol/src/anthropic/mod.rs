pub mod error;
pub mod stream;
pub mod types;

pub use error::{ErrorDetail, ErrorResponse, ErrorResponseType, ErrorType};
pub use stream::{
    RawStreamEvent, StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamMessage,
    StreamMessageDelta, StreamUsage,
};
pub use types::{
    ContentBlock, CreateMessageRequestBody, ImageSource, Message, MessageContent,
    MessageResponse, MessageResponseType, MessageRole, Metadata, StopReason, SystemPrompt,
    ToolChoice, ToolDefinition, ToolResultContent, Usage,
};
