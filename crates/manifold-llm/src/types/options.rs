use serde::{Deserialize, Serialize};

/// How the engine distributes calls across the provider pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// One cursor per candidate set, advancing modulo the set size
    #[default]
    RoundRobin,
    /// Independent uniform choice on every call
    Random,
    /// Always the first candidate
    FirstAvailable,
}

/// Per-call options recognized by the engine and providers
///
/// Every field is optional; unset sampling fields fall back to the chosen
/// provider's configured defaults. `tools`, `tool_choice` and
/// `response_format` are opaque pass-throughs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Restrict selection to providers configured with this model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether the caller wants a streaming response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions (opaque pass-through)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    /// Tool selection directive (opaque pass-through)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Response format directive (opaque pass-through)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
    /// Load distribution policy for this call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balance_strategy: Option<LoadBalanceStrategy>,
}

impl CompletionOptions {
    /// The strategy for this call, defaulting to round-robin
    pub fn strategy(&self) -> LoadBalanceStrategy {
        self.load_balance_strategy.unwrap_or_default()
    }

    /// Whether the caller requested a JSON-object response format
    pub fn wants_json_object(&self) -> bool {
        self.response_format
            .as_ref()
            .and_then(|f| f.get("type"))
            .and_then(|t| t.as_str())
            .is_some_and(|t| t == "json_object")
    }
}
