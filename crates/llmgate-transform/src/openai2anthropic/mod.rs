pub mod response;
pub mod stream;

use llmgate_protocol::anthropic::StopReason;
use llmgate_protocol::openai::FinishReason;

pub(crate) fn map_finish_reason(reason: FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ToolCalls | FinishReason::FunctionCall => StopReason::ToolUse,
        FinishReason::ContentFilter => StopReason::Refusal,
    }
}
