pub mod anthropic;
pub mod openai;
pub mod sse;

pub type JsonValue = serde_json::Value;
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
