//! Claude provider implementation using the AWS Bedrock Converse API

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ContentBlockDelta, ConversationRole, ConverseOutput, ConverseStreamOutput, InferenceConfiguration,
    Message as BedrockMessage, StopReason, SystemContentBlock,
};
use futures_util::StreamExt;
use manifold_config::{ProviderConfig, ProviderKind};
use secrecy::ExposeSecret;

use super::{ChunkStream, Provider, response_id, unix_timestamp};
use crate::error::ProviderError;
use crate::pricing;
use crate::types::{
    Choice, ChoiceMessage, CompletionOptions, CompletionResponse, Delta, FinishReason, Message, Role, StreamChunk,
    Usage,
};

/// Claude provider backed by AWS Bedrock
pub struct ClaudeProvider {
    name: String,
    model: String,
    client: BedrockClient,
    temperature: Option<f64>,
    top_p: Option<f64>,
    max_tokens: Option<u32>,
}

impl ClaudeProvider {
    /// Create from provider configuration
    ///
    /// Uses explicit credentials when `api_key`/`secret_key` are set,
    /// otherwise the default AWS credential chain. The configured timeout
    /// and retry count map onto the SDK's operation timeout and standard
    /// retry mode.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Config` if the region is missing.
    pub async fn new(name: String, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let region = config.region.clone().unwrap_or_else(|| "us-east-1".to_owned());

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(config.timeout_secs))
                    .build(),
            )
            .retry_config(aws_config::retry::RetryConfig::standard().with_max_attempts(config.max_retries + 1));

        if let (Some(access_key), Some(secret_key)) = (&config.api_key, &config.secret_key) {
            let credentials = aws_credential_types::Credentials::new(
                access_key.expose_secret(),
                secret_key.expose_secret(),
                None,
                None,
                "manifold-config",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        Ok(Self {
            name,
            model: config.model.clone(),
            client: BedrockClient::new(&sdk_config),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        })
    }

    fn inference_config(&self, options: &CompletionOptions) -> InferenceConfiguration {
        let mut builder = InferenceConfiguration::builder()
            .temperature(options.temperature.or(self.temperature).unwrap_or(0.1) as f32)
            .max_tokens(options.max_tokens.or(self.max_tokens).unwrap_or(4096) as i32);

        if let Some(top_p) = options.top_p.or(self.top_p) {
            builder = builder.top_p(top_p as f32);
        }

        builder.build()
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let (system_blocks, converse_messages) = build_converse_input(messages);

        let mut converse = self.client.converse().model_id(&self.model);
        for block in system_blocks {
            converse = converse.system(block);
        }
        for message in converse_messages {
            converse = converse.messages(message);
        }
        converse = converse.inference_config(self.inference_config(options));

        let output = converse.send().await.map_err(|e| {
            tracing::warn!(provider = %self.name, error = %e, "bedrock converse failed");
            ProviderError::Transport(e.to_string())
        })?;

        let finish_reason = Some(map_stop_reason(output.stop_reason()));

        let content = match output.output() {
            Some(ConverseOutput::Message(message)) => extract_text(message),
            _ => String::new(),
        };

        let usage = output.usage().map(|u| {
            self.usage(
                u32::try_from(u.input_tokens()).unwrap_or_default(),
                u32::try_from(u.output_tokens()).unwrap_or_default(),
            )
        });

        Ok(CompletionResponse {
            id: response_id(),
            object: "chat.completion".to_owned(),
            created: unix_timestamp(),
            model: self.model.clone(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage::text(content),
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
        let (system_blocks, converse_messages) = build_converse_input(messages);

        let mut converse = self.client.converse_stream().model_id(&self.model);
        for block in system_blocks {
            converse = converse.system(block);
        }
        for message in converse_messages {
            converse = converse.messages(message);
        }
        converse = converse.inference_config(self.inference_config(options));

        let output = converse.send().await.map_err(|e| {
            tracing::warn!(provider = %self.name, error = %e, "bedrock converse_stream failed");
            ProviderError::Transport(e.to_string())
        })?;

        let id = response_id();
        let created = unix_timestamp();
        let model = self.model.clone();

        // The SDK hands back an event receiver rather than a Stream; unfold
        // it, emitting an empty placeholder chunk for unhandled event kinds
        // and filtering those out below.
        let receiver = output.stream;
        let stream = futures_util::stream::unfold(
            (receiver, id, created, model),
            |(mut receiver, id, created, model)| async move {
                match receiver.recv().await {
                    Ok(Some(event)) => {
                        let chunk = map_stream_event(&event, &id, created, &model);
                        Some((Ok(chunk), (receiver, id, created, model)))
                    }
                    Ok(None) => None,
                    Err(e) => Some((
                        Err(ProviderError::Streaming(e.to_string())),
                        (receiver, id, created, model),
                    )),
                }
            },
        );

        let filtered = stream.filter(|item| {
            let keep = match item {
                Ok(chunk) => !chunk.choices.is_empty() || chunk.usage.is_some(),
                Err(_) => true,
            };
            async move { keep }
        });

        Ok(Box::pin(filtered))
    }
}

/// Map one Converse stream event to a chunk
///
/// Unhandled event kinds yield an empty chunk the caller filters out.
fn map_stream_event(event: &ConverseStreamOutput, id: &str, created: u64, model: &str) -> StreamChunk {
    let empty = StreamChunk {
        id: id.to_owned(),
        object: "chat.completion.chunk".to_owned(),
        created,
        model: model.to_owned(),
        choices: Vec::new(),
        usage: None,
    };

    match event {
        ConverseStreamOutput::ContentBlockDelta(delta) => match delta.delta() {
            Some(ContentBlockDelta::Text(text)) => StreamChunk::delta(id, created, model, Delta::content(text.clone())),
            _ => empty,
        },
        ConverseStreamOutput::MessageStop(stop) => {
            StreamChunk::terminal(id, created, model, map_stop_reason(stop.stop_reason()))
        }
        ConverseStreamOutput::Metadata(metadata) => match metadata.usage() {
            Some(u) => {
                let prompt = u32::try_from(u.input_tokens()).unwrap_or_default();
                let completion = u32::try_from(u.output_tokens()).unwrap_or_default();
                let cost = pricing::completion_cost(ProviderKind::Claude, model, prompt, completion);
                StreamChunk {
                    usage: Some(Usage::new(prompt, completion, cost)),
                    ..empty
                }
            }
            None => empty,
        },
        _ => empty,
    }
}

const fn map_stop_reason(reason: &StopReason) -> FinishReason {
    match reason {
        StopReason::MaxTokens => FinishReason::Length,
        StopReason::ToolUse => FinishReason::ToolCalls,
        StopReason::ContentFiltered => FinishReason::ContentFilter,
        // EndTurn, StopSequence and unknown variants default to Stop
        _ => FinishReason::Stop,
    }
}

/// Split canonical messages into system blocks and conversation turns
///
/// Tool results have no dedicated slot here; they travel as user turns.
fn build_converse_input(messages: &[Message]) -> (Vec<SystemContentBlock>, Vec<BedrockMessage>) {
    let mut system_blocks = Vec::new();
    let mut converse_messages = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::System => {
                system_blocks.push(SystemContentBlock::Text(message.content.clone()));
                continue;
            }
            Role::Assistant => ConversationRole::Assistant,
            Role::User | Role::Tool => ConversationRole::User,
        };

        if let Ok(bedrock_message) = BedrockMessage::builder()
            .role(role)
            .content(ContentBlock::Text(message.content.clone()))
            .build()
        {
            converse_messages.push(bedrock_message);
        }
    }

    (system_blocks, converse_messages)
}

fn extract_text(message: &BedrockMessage) -> String {
    let mut text = String::new();
    for block in message.content() {
        if let ContentBlock::Text(t) = block {
            text.push_str(t);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_system_blocks() {
        let messages = [Message::system("be terse"), Message::user("hi")];
        let (system, turns) = build_converse_input(&messages);
        assert_eq!(system.len(), 1);
        assert_eq!(turns.len(), 1);
    }

    #[test]
    fn stop_reasons_normalize() {
        assert_eq!(map_stop_reason(&StopReason::EndTurn), FinishReason::Stop);
        assert_eq!(map_stop_reason(&StopReason::MaxTokens), FinishReason::Length);
        assert_eq!(map_stop_reason(&StopReason::ToolUse), FinishReason::ToolCalls);
    }
}
