//! Qwen provider implementation over the DashScope API

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
use crate::protocol::qwen::{QwenInput, QwenParameters, QwenRequest, QwenResponse, wire_messages};
use crate::types::{
    Choice, ChoiceMessage, CompletionOptions, CompletionResponse, Delta, FinishReason, Message, StreamChoice,
    StreamChunk, Usage,
};

/// Default DashScope API base URL
const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

/// Text-generation endpoint path
const GENERATION_PATH: &str = "/services/aigc/text-generation/generation";

/// Qwen provider
pub struct QwenProvider {
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

impl QwenProvider {
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

    fn generation_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}{GENERATION_PATH}")
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    fn build_request(&self, messages: &[Message], options: &CompletionOptions, stream: bool) -> QwenRequest {
        QwenRequest {
            model: self.model.clone(),
            input: QwenInput {
                messages: wire_messages(messages),
            },
            parameters: QwenParameters {
                temperature: options.temperature.or(self.temperature).unwrap_or(0.7),
                max_tokens: options.max_tokens.or(self.max_tokens).unwrap_or(2000),
                top_p: options.top_p.or(self.top_p).unwrap_or(0.8),
                incremental_output: stream.then_some(true),
                result_format: options.wants_json_object().then(|| "message".to_owned()),
                tools: options.tools.clone(),
            },
        }
    }
}

#[async_trait]
impl Provider for QwenProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Qwen
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let wire_request = self.build_request(messages, options, false);

        let builder = self.authorize(self.client.post(self.generation_url()).json(&wire_request));
        let response = send_with_retry(builder, self.max_retries, &self.name).await?;
        let response = check_status(response, &self.name).await?;

        let wire_response: QwenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let usage = wire_response
            .usage
            .as_ref()
            .map(|u| self.usage(u.input_tokens, u.output_tokens));

        let finish_reason = wire_response
            .output
            .finish_reason
            .as_deref()
            .and_then(FinishReason::parse)
            .or(Some(FinishReason::Stop));

        Ok(CompletionResponse {
            id: wire_response.request_id.unwrap_or_else(response_id),
            object: "chat.completion".to_owned(),
            created: unix_timestamp(),
            model: self.model.clone(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: "assistant".to_owned(),
                    content: Some(wire_response.output.text.unwrap_or_default()),
                    tool_calls: wire_response.output.tool_calls,
                },
                finish_reason,
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
        let wire_request = self.build_request(messages, options, true);

        let builder = self
            .authorize(self.client.post(self.generation_url()).json(&wire_request))
            .header("Accept", "text/event-stream");
        let response = send_with_retry(builder, self.max_retries, &self.name).await?;
        let response = check_status(response, &self.name).await?;

        // One id and timestamp for the whole stream
        let id = response_id();
        let created = unix_timestamp();
        let model = self.model.clone();

        let mapped = response.bytes_stream().eventsource().filter_map(move |result| {
            let item = match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data.is_empty() {
                        None
                    } else {
                        match serde_json::from_str::<QwenResponse>(&data) {
                            Ok(chunk) => event_to_chunk(chunk, &id, created, &model).map(Ok),
                            Err(e) => {
                                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                                None
                            }
                        }
                    }
                }
                Err(e) => Some(Err(ProviderError::Streaming(e.to_string()))),
            };
            async move { item }
        });

        Ok(Box::pin(mapped))
    }
}

/// Map one DashScope event to a chunk, dropping events that carry neither
/// text, nor a terminal signal, nor usage
fn event_to_chunk(response: QwenResponse, id: &str, created: u64, model: &str) -> Option<StreamChunk> {
    let content = response.output.text.filter(|t| !t.is_empty());
    let finish_reason = response.output.finish_reason.as_deref().and_then(FinishReason::parse);
    let usage = response.usage.map(|u| {
        let cost = pricing::completion_cost(ProviderKind::Qwen, model, u.input_tokens, u.output_tokens);
        Usage::new(u.input_tokens, u.output_tokens, cost)
    });

    if content.is_none() && finish_reason.is_none() && usage.is_none() {
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
                content,
                tool_calls: None,
            },
            finish_reason,
        }],
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_events_become_delta_chunks() {
        let raw = r#"{"output": {"text": "hel", "finish_reason": "null"}}"#;
        let response: QwenResponse = serde_json::from_str(raw).unwrap();
        let chunk = event_to_chunk(response, "id", 0, "qwen-turbo").unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hel"));
        assert!(!chunk.is_terminal());
    }

    #[test]
    fn terminal_event_carries_finish_and_priced_usage() {
        let raw = r#"{
            "output": {"text": "", "finish_reason": "stop"},
            "usage": {"input_tokens": 1000, "output_tokens": 1000, "total_tokens": 2000}
        }"#;
        let response: QwenResponse = serde_json::from_str(raw).unwrap();
        let chunk = event_to_chunk(response, "id", 0, "qwen-turbo").unwrap();
        assert!(chunk.is_terminal());
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.total_tokens, 2000);
        assert!((usage.cost.unwrap() - 0.008).abs() < 1e-9);
    }

    #[test]
    fn empty_events_are_dropped() {
        let raw = r#"{"output": {"text": "", "finish_reason": "null"}}"#;
        let response: QwenResponse = serde_json::from_str(raw).unwrap();
        assert!(event_to_chunk(response, "id", 0, "qwen-turbo").is_none());
    }
}
