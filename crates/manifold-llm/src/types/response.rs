use serde::{Deserialize, Serialize};

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the token limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
}

impl FinishReason {
    /// Lenient parse from a wire-format string
    ///
    /// Providers disagree on spelling; unknown terminal values map to
    /// `Stop`. `"null"` and empty strings mean "still generating".
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "null" => None,
            "length" | "max_tokens" => Some(Self::Length),
            "tool_calls" | "tool_use" | "function_call" => Some(Self::ToolCalls),
            "content_filter" => Some(Self::ContentFilter),
            _ => Some(Self::Stop),
        }
    }
}

/// Token usage statistics for one completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Always `prompt_tokens + completion_tokens`
    pub total_tokens: u32,
    /// Monetary cost in USD; absent when the model is unpriced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Usage {
    /// Build usage from token counts
    ///
    /// `total_tokens` is always the arithmetic sum; callers never set it
    /// independently, even when the backend reports its own total.
    pub const fn new(prompt_tokens: u32, completion_tokens: u32, cost: Option<f64>) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost,
        }
    }
}

/// Message content within a response choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// Always "assistant" for completions
    pub role: String,
    /// Text content
    pub content: Option<String>,
    /// Tool calls requested by the model (opaque pass-through)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

impl ChoiceMessage {
    /// Plain text message from the assistant
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: Some(content.into()),
            tool_calls: None,
        }
    }
}

/// A single completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice
    pub index: u32,
    /// Generated message
    pub message: ChoiceMessage,
    /// Why generation stopped
    pub finish_reason: Option<FinishReason>,
}

/// Normalized completion response, one per non-streaming call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Unique response identifier
    pub id: String,
    /// Object type, always "chat.completion"
    #[serde(default = "completion_object")]
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model that produced the response
    pub model: String,
    /// Generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Backend fingerprint when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

pub(crate) fn completion_object() -> String {
    "chat.completion".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_total_is_always_the_sum() {
        let usage = Usage::new(120, 30, None);
        assert_eq!(usage.total_tokens, 150);

        let usage = Usage::new(0, 0, Some(0.0));
        assert_eq!(usage.total_tokens, 0);
    }

    #[test]
    fn absent_cost_is_not_serialized() {
        let usage = Usage::new(1, 2, None);
        let json = serde_json::to_value(&usage).unwrap();
        assert!(json.get("cost").is_none());
    }

    #[test]
    fn finish_reason_parses_provider_spellings() {
        assert_eq!(FinishReason::parse("stop"), Some(FinishReason::Stop));
        assert_eq!(FinishReason::parse("max_tokens"), Some(FinishReason::Length));
        assert_eq!(FinishReason::parse("tool_use"), Some(FinishReason::ToolCalls));
        assert_eq!(FinishReason::parse("null"), None);
        assert_eq!(FinishReason::parse(""), None);
        // Unknown terminal values collapse to Stop
        assert_eq!(FinishReason::parse("end_turn"), Some(FinishReason::Stop));
    }
}
