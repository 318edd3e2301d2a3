//! Provider trait and implementations for the backend services

pub mod claude;
pub mod deepseek;
pub mod gemini;
pub mod openai;
pub mod qwen;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;
use manifold_config::{ProviderConfig, ProviderKind};

use crate::error::ProviderError;
use crate::pricing;
use crate::types::{CompletionOptions, CompletionResponse, Message, StreamChunk, Usage};

/// Lazy sequence of stream chunks from one provider attempt
///
/// Finite and single-use. A terminal chunk (`finish_reason` set) precedes
/// normal completion; a transport failure ends the sequence with an error.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// Uniform completion contract implemented by each backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name used in logs, errors, and status output
    fn name(&self) -> &str;

    /// Backend kind
    fn kind(&self) -> ProviderKind;

    /// Configured model name, matched during selection
    fn model(&self) -> &str;

    /// Perform one non-streaming completion
    ///
    /// Issues exactly one logical network call and returns a fully
    /// normalized response — never a partially-filled one.
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Perform one streaming completion
    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError>;

    /// USD per 1K input tokens for an exact model key, if priced
    fn input_price_per_1k(&self, model: &str) -> Option<f64> {
        pricing::input_price_per_1k(self.kind(), model)
    }

    /// USD per 1K output tokens for an exact model key, if priced
    fn output_price_per_1k(&self, model: &str) -> Option<f64> {
        pricing::output_price_per_1k(self.kind(), model)
    }

    /// Usage for this provider's configured model
    ///
    /// Cost is absent — not zero — when the model is unpriced.
    fn usage(&self, prompt_tokens: u32, completion_tokens: u32) -> Usage {
        let cost = pricing::completion_cost(self.kind(), self.model(), prompt_tokens, completion_tokens);
        Usage::new(prompt_tokens, completion_tokens, cost)
    }
}

/// Construct a provider from its configuration
///
/// # Errors
///
/// Returns `ProviderError::Config` when the entry cannot yield a working
/// client (bad URL, missing credentials, client build failure).
pub async fn build(config: &ProviderConfig, name: String) -> Result<Arc<dyn Provider>, ProviderError> {
    Ok(match config.kind {
        ProviderKind::Openai => Arc::new(openai::OpenAiProvider::new(name, config)?),
        ProviderKind::Claude => Arc::new(claude::ClaudeProvider::new(name, config).await?),
        ProviderKind::Gemini => Arc::new(gemini::GeminiProvider::new(name, config)?),
        ProviderKind::Qwen => Arc::new(qwen::QwenProvider::new(name, config)?),
        ProviderKind::Deepseek => Arc::new(deepseek::DeepseekProvider::new(name, config)?),
    })
}

/// Build a reqwest client enforcing the configured request timeout
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a request, retrying transport-level failures
///
/// Retries connect and timeout errors up to `max_retries` times with a
/// doubling delay. These retries live inside one logical provider call;
/// cross-provider failover is the engine's separate layer.
pub(crate) async fn send_with_retry(
    builder: reqwest::RequestBuilder,
    max_retries: u32,
    provider: &str,
) -> Result<reqwest::Response, ProviderError> {
    let mut attempt = 0u32;
    loop {
        let Some(request) = builder.try_clone() else {
            // Non-cloneable body: single shot
            return builder.send().await.map_err(|e| ProviderError::Transport(e.to_string()));
        };

        match request.send().await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < max_retries && (e.is_connect() || e.is_timeout()) => {
                attempt += 1;
                tracing::debug!(provider, attempt, error = %e, "retrying after transport failure");
                tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
            }
            Err(e) => return Err(ProviderError::Transport(e.to_string())),
        }
    }
}

/// Turn a non-success response into `ProviderError::Upstream`
pub(crate) async fn check_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    tracing::warn!(provider, status = %status, "upstream returned error");
    Err(ProviderError::Upstream {
        status: status.as_u16(),
        message,
    })
}

/// Fresh response identifier
pub(crate) fn response_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// Current unix timestamp in seconds
pub(crate) fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
