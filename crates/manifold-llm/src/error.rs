use thiserror::Error;

/// Failure of a single provider attempt
///
/// Transport-level retries happen inside one provider call; whatever
/// surfaces here counts as one failed attempt for the engine's failover.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request never produced a response (connect, timeout, TLS)
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("upstream returned {status}: {message}")]
    Upstream {
        /// HTTP status code reported by the backend
        status: u16,
        /// Response body or error description
        message: String,
    },

    /// Backend reply could not be decoded into the normalized schema
    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    /// Transport failure while consuming an event stream
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Provider could not be constructed from its configuration
    #[error("invalid provider configuration: {0}")]
    Config(String),
}

/// One failed attempt within a failover sweep
#[derive(Debug)]
pub struct FailedAttempt {
    /// Display name of the provider that failed
    pub provider: String,
    /// Why the attempt failed
    pub error: ProviderError,
}

/// Terminal outcome of a logical engine call
#[derive(Debug, Error)]
pub enum EngineError {
    /// The pool has no usable providers
    ///
    /// Fatal at construction time; unreachable during selection for a
    /// correctly constructed engine.
    #[error("no usable providers in pool")]
    EmptyPool,

    /// The only provider in a singleton pool failed; no failover attempted
    #[error("provider {provider} failed: {source}")]
    Provider {
        /// Display name of the failed provider
        provider: String,
        /// Underlying attempt failure
        source: ProviderError,
    },

    /// Every provider in the pool was tried and failed
    #[error("all providers failed after {} attempts", attempts.len())]
    AllProvidersFailed {
        /// Ordered per-provider causes, for diagnostics
        attempts: Vec<FailedAttempt>,
    },
}
