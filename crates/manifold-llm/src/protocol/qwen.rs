//! DashScope text-generation wire format (Qwen)

use serde::{Deserialize, Serialize};

use crate::types::Message;

// -- Request types --

/// DashScope generation request body
#[derive(Debug, Clone, Serialize)]
pub struct QwenRequest {
    /// Model identifier
    pub model: String,
    /// Conversation input
    pub input: QwenInput,
    /// Generation parameters
    pub parameters: QwenParameters,
}

/// Conversation input wrapper
#[derive(Debug, Clone, Serialize)]
pub struct QwenInput {
    /// Conversation messages
    pub messages: Vec<QwenMessage>,
}

/// Message within a DashScope request
#[derive(Debug, Clone, Serialize)]
pub struct QwenMessage {
    /// Message role
    pub role: &'static str,
    /// Text content
    pub content: String,
}

/// Generation parameters
#[derive(Debug, Clone, Serialize)]
pub struct QwenParameters {
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Nucleus sampling threshold
    pub top_p: f64,
    /// Stream only newly generated text on each event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental_output: Option<bool>,
    /// "message" when the caller asked for a JSON object response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_format: Option<String>,
    /// Tool definitions (opaque pass-through)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
}

/// Translate canonical messages into the wire shape
pub fn wire_messages(messages: &[Message]) -> Vec<QwenMessage> {
    messages
        .iter()
        .map(|m| QwenMessage {
            role: m.role.as_str(),
            content: m.content.clone(),
        })
        .collect()
}

// -- Response types --

/// DashScope generation response; streamed events share this shape
#[derive(Debug, Clone, Deserialize)]
pub struct QwenResponse {
    /// Generation output
    pub output: QwenOutput,
    /// Token usage
    #[serde(default)]
    pub usage: Option<QwenUsage>,
    /// Request identifier assigned by the backend
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Generation output
#[derive(Debug, Clone, Deserialize)]
pub struct QwenOutput {
    /// Generated text
    #[serde(default)]
    pub text: Option<String>,
    /// "null" while generating, a terminal value on the last event
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Tool calls (opaque pass-through)
    #[serde(default)]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

/// Token usage
#[derive(Debug, Clone, Deserialize)]
pub struct QwenUsage {
    /// Prompt tokens
    #[serde(default)]
    pub input_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub output_tokens: u32,
    /// Backend-reported total; ignored in favor of the sum
    #[serde(default)]
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FinishReason;

    #[test]
    fn response_decodes_output_and_usage() {
        let raw = r#"{
            "output": {"text": "hello", "finish_reason": "stop"},
            "usage": {"input_tokens": 10, "output_tokens": 2, "total_tokens": 12},
            "request_id": "r-1"
        }"#;
        let response: QwenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.output.text.as_deref(), Some("hello"));
        assert_eq!(response.usage.unwrap().input_tokens, 10);
    }

    #[test]
    fn in_flight_finish_reason_is_the_string_null() {
        let raw = r#"{"output": {"text": "partial", "finish_reason": "null"}}"#;
        let response: QwenResponse = serde_json::from_str(raw).unwrap();
        let reason = response.output.finish_reason.as_deref().and_then(FinishReason::parse);
        assert!(reason.is_none());
    }
}
