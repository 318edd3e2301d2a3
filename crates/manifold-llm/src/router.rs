//! Axum route handlers exposing the OpenAI-compatible HTTP surface
//!
//! Pure shape translation: wire JSON in, `(messages, options)` to the
//! engine, normalized JSON or SSE back out. No routing decisions live
//! here, and the engine knows nothing about status codes.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::engine::{Engine, EngineStream};
use crate::error::EngineError;
use crate::provider::unix_timestamp;
use crate::types::{CompletionOptions, LoadBalanceStrategy, Message};

/// Inbound chat completion request, OpenAI wire shape
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    /// Requested model name
    pub model: String,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: Option<bool>,
    /// Tool definitions (opaque pass-through)
    #[serde(default)]
    pub tools: Option<Vec<serde_json::Value>>,
    /// Tool choice directive (opaque pass-through)
    #[serde(default)]
    pub tool_choice: Option<serde_json::Value>,
    /// Response format directive (opaque pass-through)
    #[serde(default)]
    pub response_format: Option<serde_json::Value>,
    /// Load distribution policy override
    #[serde(default)]
    pub load_balance_strategy: Option<LoadBalanceStrategy>,
}

impl ChatCompletionRequest {
    /// Split the wire request into the engine's input shape
    fn into_parts(self) -> (Vec<Message>, CompletionOptions) {
        let options = CompletionOptions {
            model: (!self.model.is_empty()).then_some(self.model),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stream: self.stream,
            tools: self.tools,
            tool_choice: self.tool_choice,
            response_format: self.response_format,
            load_balance_strategy: self.load_balance_strategy,
        };

        (self.messages, options)
    }
}

/// Build the completion router with all endpoints
pub fn llm_router(engine: Engine) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/models", routing::get(list_models))
        .route("/v1/providers/status", routing::get(provider_status))
        .with_state(engine)
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(State(engine): State<Engine>, Json(request): Json<ChatCompletionRequest>) -> Response {
    let is_stream = request.stream.unwrap_or(false);
    let (messages, options) = request.into_parts();

    if is_stream {
        stream_response(engine.complete_stream(messages, options)).into_response()
    } else {
        match engine.complete(&messages, &options).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

/// Handle `GET /v1/models`: one entry per pool provider
async fn list_models(State(engine): State<Engine>) -> Response {
    let created = unix_timestamp();
    let data: Vec<ModelEntry> = engine
        .status()
        .providers
        .into_iter()
        .map(|provider| ModelEntry {
            id: provider.model,
            object: "model".to_owned(),
            created,
            owned_by: provider.kind.to_string(),
        })
        .collect();

    Json(ModelList {
        object: "list".to_owned(),
        data,
    })
    .into_response()
}

/// Handle `GET /v1/providers/status`
async fn provider_status(State(engine): State<Engine>) -> Response {
    Json(engine.status()).into_response()
}

/// Models list response body
#[derive(Debug, Serialize)]
struct ModelList {
    object: String,
    data: Vec<ModelEntry>,
}

/// One model entry
#[derive(Debug, Serialize)]
struct ModelEntry {
    id: String,
    object: String,
    created: u64,
    owned_by: String,
}

/// Frame the engine stream as SSE, closing with an explicit end marker
fn stream_response(stream: EngineStream) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = stream
        .map(|item| match item {
            Ok(chunk) => {
                let data = serde_json::to_string(&chunk).unwrap_or_default();
                Ok(Event::default().data(data))
            }
            Err(e) => {
                let body = serde_json::json!({
                    "error": {
                        "message": e.to_string(),
                        "type": error_type(&e),
                    }
                });
                Ok(Event::default().data(body.to_string()))
            }
        })
        .chain(futures_util::stream::once(async { Ok(Event::default().data("[DONE]")) }));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Map a terminal engine error to a single JSON error object
fn error_response(error: &EngineError) -> Response {
    let status = match error {
        EngineError::EmptyPool => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Provider { .. } | EngineError::AllProvidersFailed { .. } => StatusCode::BAD_GATEWAY,
    };

    let body = serde_json::json!({
        "error": {
            "message": error.to_string(),
            "type": error_type(error),
        }
    });

    (status, Json(body)).into_response()
}

const fn error_type(error: &EngineError) -> &'static str {
    match error {
        EngineError::EmptyPool => "configuration_error",
        EngineError::Provider { .. } => "upstream_error",
        EngineError::AllProvidersFailed { .. } => "all_providers_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn wire_request_maps_to_messages_and_options() {
        let raw = r#"{
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"}
            ],
            "temperature": 0.3,
            "stream": true,
            "load_balance_strategy": "random"
        }"#;
        let request: ChatCompletionRequest = serde_json::from_str(raw).unwrap();
        let (messages, options) = request.into_parts();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(options.model.as_deref(), Some("gpt-4o"));
        assert_eq!(options.temperature, Some(0.3));
        assert_eq!(options.load_balance_strategy, Some(LoadBalanceStrategy::Random));
    }

    #[test]
    fn empty_model_disables_filtering() {
        let raw = r#"{"model": "", "messages": []}"#;
        let request: ChatCompletionRequest = serde_json::from_str(raw).unwrap();
        let (_, options) = request.into_parts();
        assert!(options.model.is_none());
    }
}
