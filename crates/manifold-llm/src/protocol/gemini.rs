//! Google Generative Language API wire format (Gemini)

use serde::{Deserialize, Serialize};

use crate::types::{Message, Role};

// -- Request types --

/// `generateContent` request body
#[derive(Debug, Clone, Serialize)]
pub struct GeminiRequest {
    /// Conversation contents
    pub contents: Vec<GeminiContent>,
    /// System instruction, split out of the conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    /// Generation configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

/// Content object containing a role and text parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    /// "user" or "model"; absent on system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// Text part within a content object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    /// The text string
    #[serde(default)]
    pub text: String,
}

/// Generation configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling threshold
    pub top_p: f64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// "application/json" when the caller asked for a JSON object response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

/// Split canonical messages into conversation contents and a system
/// instruction, mapping assistant turns to the "model" role
pub fn wire_contents(messages: &[Message]) -> (Vec<GeminiContent>, Option<GeminiContent>) {
    let mut contents = Vec::new();
    let mut system_parts: Vec<GeminiPart> = Vec::new();

    for message in messages {
        match message.role {
            Role::System => system_parts.push(GeminiPart {
                text: message.content.clone(),
            }),
            Role::Assistant => contents.push(GeminiContent {
                role: Some("model".to_owned()),
                parts: vec![GeminiPart {
                    text: message.content.clone(),
                }],
            }),
            // Tool results have no dedicated slot in this dialect; they
            // travel as user turns like any other caller-provided context.
            Role::User | Role::Tool => contents.push(GeminiContent {
                role: Some("user".to_owned()),
                parts: vec![GeminiPart {
                    text: message.content.clone(),
                }],
            }),
        }
    }

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: system_parts,
        })
    };

    (contents, system_instruction)
}

// -- Response types --

/// `generateContent` response; streamed SSE events share this shape
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Generated candidates
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Token usage metadata
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsageMetadata>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate's parts
    pub fn text(&self) -> String {
        self.candidates.first().map_or_else(String::new, |candidate| {
            candidate
                .content
                .as_ref()
                .map_or_else(String::new, |content| {
                    content.parts.iter().map(|p| p.text.as_str()).collect()
                })
        })
    }
}

/// Generated candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// Generated content
    #[serde(default)]
    pub content: Option<GeminiContent>,
    /// Finish reason (e.g. "STOP", "MAX_TOKENS")
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Candidate index
    #[serde(default)]
    pub index: Option<u32>,
}

/// Token usage metadata
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    /// Prompt token count
    #[serde(default)]
    pub prompt_token_count: u32,
    /// Candidates token count
    #[serde(default)]
    pub candidates_token_count: u32,
    /// Total token count
    #[serde(default)]
    pub total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_split_out_of_the_conversation() {
        let messages = [
            Message::system("be terse"),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let (contents, system) = wire_contents(&messages);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(system.unwrap().parts[0].text, "be terse");
    }

    #[test]
    fn response_text_joins_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "a"}, {"text": "b"}]},
                "finishReason": "STOP", "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        }"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text(), "ab");
        assert_eq!(response.usage_metadata.unwrap().prompt_token_count, 4);
    }

    #[test]
    fn empty_candidates_yield_empty_text() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), "");
    }
}
