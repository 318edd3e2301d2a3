//! DeepSeek provider implementation
//!
//! DeepSeek's REST API is OpenAI-shaped; only the base URL, auth, and the
//! price table differ.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use manifold_config::{ProviderConfig, ProviderKind};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{ChunkStream, Provider, check_status, http_client, send_with_retry};
use crate::error::ProviderError;
use crate::protocol::openai::{OpenAiResponse, OpenAiStreamChunk, build_request, chunk_to_internal, response_to_internal};
use crate::types::{CompletionOptions, CompletionResponse, Message};

/// Default DeepSeek API base URL
const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

/// DeepSeek provider
pub struct DeepseekProvider {
    name: String,
    model: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    max_retries: u32,
    sampling_defaults: (Option<f64>, Option<f64>, Option<u32>),
}

impl DeepseekProvider {
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
            sampling_defaults: (config.temperature, config.top_p, config.max_tokens),
        })
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl Provider for DeepseekProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Deepseek
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let wire_request = build_request(&self.model, messages, options, self.sampling_defaults, false);

        let builder = self.authorize(self.client.post(self.completions_url()).json(&wire_request));
        let response = send_with_retry(builder, self.max_retries, &self.name).await?;
        let response = check_status(response, &self.name).await?;

        let wire_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(response_to_internal(wire_response, ProviderKind::Deepseek, &self.model))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let wire_request = build_request(&self.model, messages, options, self.sampling_defaults, true);

        let builder = self.authorize(self.client.post(self.completions_url()).json(&wire_request));
        let response = send_with_retry(builder, self.max_retries, &self.name).await?;
        let response = check_status(response, &self.name).await?;

        let model = self.model.clone();
        let mapped = response.bytes_stream().eventsource().filter_map(move |result| {
            let item = match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data.is_empty() || data == "[DONE]" {
                        None
                    } else {
                        match serde_json::from_str::<OpenAiStreamChunk>(&data) {
                            Ok(chunk) => chunk_to_internal(chunk, ProviderKind::Deepseek, &model).map(Ok),
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
