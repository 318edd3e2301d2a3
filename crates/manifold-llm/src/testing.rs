//! Scripted providers for exercising the selector and engine

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use manifold_config::ProviderKind;

use crate::error::ProviderError;
use crate::provider::{ChunkStream, Provider};
use crate::types::{
    Choice, ChoiceMessage, CompletionOptions, CompletionResponse, Delta, FinishReason, Message, StreamChunk, Usage,
};

enum FailMode {
    /// Succeed on every call
    Never,
    /// Fail every call before producing anything
    Always,
    /// Start streaming, then fail after the first chunk
    MidStream,
}

/// Provider with scripted behavior and a call counter
pub(crate) struct MockProvider {
    name: String,
    model: String,
    mode: FailMode,
    calls: AtomicUsize,
}

impl MockProvider {
    fn build(name: &str, model: &str, mode: FailMode) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            model: model.to_owned(),
            mode,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn healthy(name: impl AsRef<str>, model: &str) -> Arc<Self> {
        Self::build(name.as_ref(), model, FailMode::Never)
    }

    pub fn failing(name: &str, model: &str) -> Arc<Self> {
        Self::build(name, model, FailMode::Always)
    }

    pub fn failing_mid_stream(name: &str, model: &str) -> Arc<Self> {
        Self::build(name, model, FailMode::MidStream)
    }

    /// Number of completion calls this provider has received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Provider for MockProvider {
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
        _messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        match self.mode {
            FailMode::Never => Ok(CompletionResponse {
                id: format!("resp-{}", self.name),
                object: "chat.completion".to_owned(),
                created: 0,
                model: self.model.clone(),
                choices: vec![Choice {
                    index: 0,
                    message: ChoiceMessage::text(format!("ok from {}", self.name)),
                    finish_reason: Some(FinishReason::Stop),
                }],
                usage: Some(Usage::new(1, 1, None)),
                system_fingerprint: None,
            }),
            FailMode::Always | FailMode::MidStream => Err(ProviderError::Transport("scripted failure".to_owned())),
        }
    }

    async fn complete_stream(
        &self,
        _messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let id = format!("resp-{}", self.name);
        let items: Vec<Result<StreamChunk, ProviderError>> = match self.mode {
            FailMode::Always => {
                return Err(ProviderError::Transport("scripted failure".to_owned()));
            }
            FailMode::MidStream => vec![
                Ok(StreamChunk::delta(
                    id,
                    0,
                    self.model.clone(),
                    Delta::content(format!("partial from {}", self.name)),
                )),
                Err(ProviderError::Streaming("scripted mid-stream failure".to_owned())),
            ],
            FailMode::Never => vec![
                Ok(StreamChunk::delta(
                    id.clone(),
                    0,
                    self.model.clone(),
                    Delta::content(format!("hello from {}", self.name)),
                )),
                Ok(StreamChunk::terminal(id, 0, self.model.clone(), FinishReason::Stop)),
            ],
        };

        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}
