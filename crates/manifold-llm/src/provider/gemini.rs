//! Gemini provider implementation over the Generative Language API

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use manifold_config::{ProviderConfig, ProviderKind};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{ChunkStream, Provider, check_status, http_client, response_id, send_with_retry, unix_timestamp};
use crate::error::ProviderError;
use crate::pricing;
use crate::protocol::gemini::{GeminiGenerationConfig, GeminiRequest, GeminiResponse, wire_contents};
use crate::types::{
    Choice, ChoiceMessage, CompletionOptions, CompletionResponse, Delta, FinishReason, Message, StreamChoice,
    StreamChunk, Usage,
};

/// Default Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider
pub struct GeminiProvider {
    name: String,
    model: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    max_retries: u32,
    temperature: Option<f64>,
    top_p: Option<f64>,
    max_tokens: Option<u32>,
}

impl GeminiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Config` if the HTTP client cannot be built.
    pub fn new(name: String, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let base_url = config
            .api_base
            .clone()
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));

        Ok(Self {
            name,
            model: config.model.clone(),
            client: http_client(config.timeout_secs)?,
            base_url,
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        })
    }

    fn generate_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = format!("{base}/models/{}:generateContent", self.model);
        if let Some(key) = &self.api_key {
            url.push_str("?key=");
            url.push_str(key.expose_secret());
        }
        url
    }

    fn stream_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = format!("{base}/models/{}:streamGenerateContent?alt=sse", self.model);
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(key.expose_secret());
        }
        url
    }

    fn build_request(&self, messages: &[Message], options: &CompletionOptions) -> GeminiRequest {
        let (contents, system_instruction) = wire_contents(messages);

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: Some(GeminiGenerationConfig {
                temperature: options.temperature.or(self.temperature).unwrap_or(1.0),
                top_p: options.top_p.or(self.top_p).unwrap_or(1.0),
                max_output_tokens: options.max_tokens.or(self.max_tokens).unwrap_or(8192),
                response_mime_type: options.wants_json_object().then(|| "application/json".to_owned()),
            }),
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let wire_request = self.build_request(messages, options);

        let builder = self.client.post(self.generate_url()).json(&wire_request);
        let response = send_with_retry(builder, self.max_retries, &self.name).await?;
        let response = check_status(response, &self.name).await?;

        let wire_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let usage = wire_response
            .usage_metadata
            .as_ref()
            .map(|u| self.usage(u.prompt_token_count, u.candidates_token_count));

        Ok(CompletionResponse {
            id: response_id(),
            object: "chat.completion".to_owned(),
            created: unix_timestamp(),
            model: self.model.clone(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage::text(wire_response.text()),
                finish_reason: Some(FinishReason::Stop),
            }],
            usage,
            system_fingerprint: None,
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let wire_request = self.build_request(messages, options);

        let builder = self.client.post(self.stream_url()).json(&wire_request);
        let response = send_with_retry(builder, self.max_retries, &self.name).await?;
        let response = check_status(response, &self.name).await?;

        let id = response_id();
        let created = unix_timestamp();
        let model = self.model.clone();
        let failed = Arc::new(AtomicBool::new(false));

        let map_failed = Arc::clone(&failed);
        let map_id = id.clone();
        let map_model = model.clone();
        let mapped = response.bytes_stream().eventsource().filter_map(move |result| {
            let item = match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data.is_empty() {
                        None
                    } else {
                        match serde_json::from_str::<GeminiResponse>(&data) {
                            Ok(chunk) => event_to_chunk(&chunk, &map_id, created, &map_model).map(Ok),
                            Err(e) => {
                                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                                None
                            }
                        }
                    }
                }
                Err(e) => {
                    map_failed.store(true, Ordering::Relaxed);
                    Some(Err(ProviderError::Streaming(e.to_string())))
                }
            };
            async move { item }
        });

        // The backend never marks its last event; close the stream with an
        // explicit terminal chunk unless the transport failed.
        let tail = futures_util::stream::iter(std::iter::once(())).filter_map(move |()| {
            let emit = !failed.load(Ordering::Relaxed);
            let terminal = StreamChunk::terminal(id.clone(), created, model.clone(), FinishReason::Stop);
            async move { emit.then_some(Ok(terminal)) }
        });

        Ok(Box::pin(mapped.chain(tail)))
    }
}

/// Map one SSE event to a chunk, dropping events with no text and no usage
fn event_to_chunk(response: &GeminiResponse, id: &str, created: u64, model: &str) -> Option<StreamChunk> {
    let text = response.text();
    let usage = response.usage_metadata.as_ref().map(|u| {
        let cost = pricing::completion_cost(ProviderKind::Gemini, model, u.prompt_token_count, u.candidates_token_count);
        Usage::new(u.prompt_token_count, u.candidates_token_count, cost)
    });

    if text.is_empty() && usage.is_none() {
        return None;
    }

    Some(StreamChunk {
        id: id.to_owned(),
        object: "chat.completion.chunk".to_owned(),
        created,
        model: model.to_owned(),
        choices: vec![StreamChoice {
            index: 0,
            delta: Delta {
                role: Some("assistant".to_owned()),
                content: (!text.is_empty()).then_some(text),
                tool_calls: None,
            },
            finish_reason: None,
        }],
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_events_become_delta_chunks() {
        let raw = r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "hi"}]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        let chunk = event_to_chunk(&response, "id", 0, "gemini-1.5-flash").unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hi"));
        assert!(!chunk.is_terminal());
    }

    #[test]
    fn empty_events_are_dropped() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(event_to_chunk(&response, "id", 0, "gemini-1.5-flash").is_none());
    }

    #[test]
    fn usage_is_priced_for_known_models() {
        let raw = r#"{
            "candidates": [{"content": {"parts": [{"text": "x"}]}}],
            "usageMetadata": {"promptTokenCount": 1000, "candidatesTokenCount": 1000, "totalTokenCount": 2000}
        }"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        let chunk = event_to_chunk(&response, "id", 0, "gemini-1.5-flash").unwrap();
        let usage = chunk.usage.unwrap();
        assert!((usage.cost.unwrap() - 0.000_375).abs() < 1e-9);
    }
}
