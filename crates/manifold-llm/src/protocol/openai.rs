//! OpenAI chat-completion wire format
//!
//! Shared by the OpenAI-compatible provider and DeepSeek, whose REST API
//! speaks the same dialect.

use manifold_config::ProviderKind;
use serde::{Deserialize, Serialize};

use crate::pricing;
use crate::types::{
    Choice, ChoiceMessage, CompletionOptions, CompletionResponse, Delta, FinishReason, Message, StreamChoice,
    StreamChunk, Usage,
};

// -- Request types --

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<OpenAiMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response
    pub stream: bool,
    /// Stream options (`include_usage`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAiStreamOptions>,
    /// Tool definitions (opaque pass-through)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    /// Tool choice directive (opaque pass-through)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Response format directive (opaque pass-through)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

/// Stream options
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiStreamOptions {
    /// Ask for usage statistics on the final chunk
    pub include_usage: bool,
}

/// Message within a request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiMessage {
    /// Message role
    pub role: &'static str,
    /// Text content
    pub content: String,
    /// Participant name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls (opaque pass-through)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
    /// Tool call ID this message responds to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Translate canonical messages into the wire shape
pub fn wire_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
    messages
        .iter()
        .map(|m| OpenAiMessage {
            role: m.role.as_str(),
            content: m.content.clone(),
            name: m.name.clone(),
            tool_calls: m.tool_calls.clone(),
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

/// Build a request body from canonical messages and per-call options
///
/// Sampling fields fall back to the provider's configured defaults.
pub fn build_request(
    model: &str,
    messages: &[Message],
    options: &CompletionOptions,
    defaults: (Option<f64>, Option<f64>, Option<u32>),
    stream: bool,
) -> OpenAiRequest {
    let (temperature, top_p, max_tokens) = defaults;

    OpenAiRequest {
        model: model.to_owned(),
        messages: wire_messages(messages),
        temperature: options.temperature.or(temperature),
        top_p: options.top_p.or(top_p),
        max_tokens: options.max_tokens.or(max_tokens),
        stream,
        stream_options: None,
        tools: options.tools.clone(),
        tool_choice: options.tool_choice.clone(),
        response_format: options.response_format.clone(),
    }
}

// -- Response types --

/// Chat completion response body
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    /// Response identifier
    pub id: String,
    /// Creation timestamp
    pub created: u64,
    /// Model used
    pub model: String,
    /// Generated choices
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
    /// Backend fingerprint
    #[serde(default)]
    pub system_fingerprint: Option<String>,
}

/// Choice within a response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    /// Choice index
    pub index: u32,
    /// Generated message
    pub message: OpenAiChoiceMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl OpenAiChoice {
    /// Normalize into the canonical choice shape
    pub fn into_choice(self) -> Choice {
        Choice {
            index: self.index,
            message: ChoiceMessage {
                role: self.message.role,
                content: self.message.content,
                tool_calls: self.message.tool_calls,
            },
            finish_reason: self.finish_reason.as_deref().and_then(FinishReason::parse),
        }
    }
}

/// Message within a response choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoiceMessage {
    /// Role, always "assistant"
    #[serde(default = "assistant_role")]
    pub role: String,
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls (opaque pass-through)
    #[serde(default)]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

fn assistant_role() -> String {
    "assistant".to_owned()
}

/// Token usage within a response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens as reported by the backend; ignored in favor of the sum
    #[serde(default)]
    pub total_tokens: u32,
}

// -- Streaming types --

/// One SSE chunk of a streaming completion
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Chunk identifier
    pub id: String,
    /// Creation timestamp
    pub created: u64,
    /// Model used
    pub model: String,
    /// Delta choices (empty on the trailing usage chunk)
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Usage, present on the final chunk when requested
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Choice index
    pub index: u32,
    /// Incremental delta
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Set on the terminal chunk
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl OpenAiStreamChoice {
    /// Normalize into the canonical stream choice shape
    pub fn into_stream_choice(self) -> StreamChoice {
        StreamChoice {
            index: self.index,
            delta: Delta {
                role: self.delta.role,
                content: self.delta.content,
                tool_calls: self.delta.tool_calls,
            },
            finish_reason: self.finish_reason.as_deref().and_then(FinishReason::parse),
        }
    }
}

/// Delta within a streaming choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Role, present on the first chunk
    #[serde(default)]
    pub role: Option<String>,
    /// Incremental text content
    #[serde(default)]
    pub content: Option<String>,
    /// Incremental tool calls (opaque pass-through)
    #[serde(default)]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

// -- Normalization --

/// Normalize a wire response, pricing the reported token counts
///
/// `total_tokens` is recomputed as the sum regardless of what the backend
/// reported; cost is absent when the configured model is unpriced.
pub fn response_to_internal(response: OpenAiResponse, kind: ProviderKind, model: &str) -> CompletionResponse {
    let usage = response.usage.map(|u| price_usage(&u, kind, model));

    CompletionResponse {
        id: response.id,
        object: "chat.completion".to_owned(),
        created: response.created,
        model: response.model,
        choices: response.choices.into_iter().map(OpenAiChoice::into_choice).collect(),
        usage,
        system_fingerprint: response.system_fingerprint,
    }
}

/// Normalize one wire chunk, or `None` for events carrying nothing
///
/// Events with no choices and no usage are dropped rather than forwarded.
pub fn chunk_to_internal(chunk: OpenAiStreamChunk, kind: ProviderKind, model: &str) -> Option<StreamChunk> {
    let usage = chunk.usage.map(|u| price_usage(&u, kind, model));

    if chunk.choices.is_empty() && usage.is_none() {
        return None;
    }

    Some(StreamChunk {
        id: chunk.id,
        object: "chat.completion.chunk".to_owned(),
        created: chunk.created,
        model: chunk.model,
        choices: chunk
            .choices
            .into_iter()
            .map(OpenAiStreamChoice::into_stream_choice)
            .collect(),
        usage,
    })
}

fn price_usage(usage: &OpenAiUsage, kind: ProviderKind, model: &str) -> Usage {
    let cost = pricing::completion_cost(kind, model, usage.prompt_tokens, usage.completion_tokens);
    Usage::new(usage.prompt_tokens, usage.completion_tokens, cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn messages_keep_roles_and_tool_ids() {
        let mut tool_reply = Message::new(Role::Tool, "42");
        tool_reply.tool_call_id = Some("call_1".to_owned());
        let wire = wire_messages(&[Message::system("be terse"), tool_reply]);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].role, "tool");
        assert_eq!(wire[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn response_chunk_decodes_and_normalizes() {
        let raw = r#"{
            "id": "chatcmpl-1", "object": "chat.completion.chunk",
            "created": 1700000000, "model": "deepseek-chat",
            "choices": [{"index": 0, "delta": {"content": "hi"}, "finish_reason": null}]
        }"#;
        let chunk: OpenAiStreamChunk = serde_json::from_str(raw).unwrap();
        let choice = chunk.choices.into_iter().next().unwrap().into_stream_choice();
        assert_eq!(choice.delta.content.as_deref(), Some("hi"));
        assert!(choice.finish_reason.is_none());
    }

    #[test]
    fn terminal_chunk_maps_finish_reason() {
        let raw = r#"{
            "id": "chatcmpl-1", "created": 1700000000, "model": "gpt-4o",
            "choices": [{"index": 0, "delta": {}, "finish_reason": "length"}]
        }"#;
        let chunk: OpenAiStreamChunk = serde_json::from_str(raw).unwrap();
        let choice = chunk.choices.into_iter().next().unwrap().into_stream_choice();
        assert_eq!(choice.finish_reason, Some(FinishReason::Length));
    }

    #[test]
    fn call_options_override_configured_defaults() {
        let options = CompletionOptions {
            temperature: Some(0.9),
            ..CompletionOptions::default()
        };
        let request = build_request("gpt-4o", &[], &options, (Some(0.1), Some(0.5), Some(256)), false);
        assert_eq!(request.temperature, Some(0.9));
        assert_eq!(request.top_p, Some(0.5));
        assert_eq!(request.max_tokens, Some(256));
    }
}
