use serde::{Deserialize, Serialize};

use super::response::{FinishReason, Usage};

/// Incremental update within a streaming choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    /// Role, present on the first chunk of a stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Incremental text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental tool call data (opaque pass-through)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

impl Delta {
    /// Assistant delta carrying text content
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            role: Some("assistant".to_owned()),
            content: Some(text.into()),
            tool_calls: None,
        }
    }
}

/// A single choice within a streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index this delta belongs to
    pub index: u32,
    /// Incremental delta
    pub delta: Delta,
    /// Set on the terminal chunk of the stream
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// One incremental unit of a streaming completion
///
/// Same shape as a response, with `delta` in place of `message`. The final
/// chunk of a stream carries a `finish_reason` and an empty delta; a
/// trailing usage-only chunk with empty `choices` may follow it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Chunk identifier, stable across one provider's stream
    pub id: String,
    /// Object type, always "chat.completion.chunk"
    #[serde(default = "chunk_object")]
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model that produced the chunk
    pub model: String,
    /// Delta choices
    pub choices: Vec<StreamChoice>,
    /// Cumulative usage, typically on the final chunk only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// Chunk with a single delta choice
    pub fn delta(id: impl Into<String>, created: u64, model: impl Into<String>, delta: Delta) -> Self {
        Self {
            id: id.into(),
            object: chunk_object(),
            created,
            model: model.into(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
            usage: None,
        }
    }

    /// Terminal chunk with an empty delta and the given finish reason
    pub fn terminal(id: impl Into<String>, created: u64, model: impl Into<String>, reason: FinishReason) -> Self {
        Self {
            id: id.into(),
            object: chunk_object(),
            created,
            model: model.into(),
            choices: vec![StreamChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(reason),
            }],
            usage: None,
        }
    }

    /// Whether any choice carries a finish reason
    pub fn is_terminal(&self) -> bool {
        self.choices.iter().any(|c| c.finish_reason.is_some())
    }
}

pub(crate) fn chunk_object() -> String {
    "chat.completion.chunk".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_chunk_has_empty_delta() {
        let chunk = StreamChunk::terminal("id", 0, "m", FinishReason::Stop);
        assert!(chunk.is_terminal());
        assert!(chunk.choices[0].delta.content.is_none());
    }

    #[test]
    fn delta_chunk_is_not_terminal() {
        let chunk = StreamChunk::delta("id", 0, "m", Delta::content("hi"));
        assert!(!chunk.is_terminal());
    }
}
