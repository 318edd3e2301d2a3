//! Routing and failover engine
//!
//! One engine owns an ordered pool of providers for its whole lifetime.
//! Each logical call picks a provider through the selector, invokes it,
//! and on failure sweeps the remaining pool in order until one succeeds
//! or the pool is exhausted.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use manifold_config::{ProviderConfig, ProviderKind};
use serde::Serialize;

use crate::error::{EngineError, FailedAttempt, ProviderError};
use crate::provider::{self, ChunkStream, Provider};
use crate::selector::Selector;
use crate::types::{CompletionOptions, CompletionResponse, Message, StreamChunk};

/// Chunk stream whose failures are terminal engine outcomes
pub type EngineStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, EngineError>> + Send>>;

struct EngineInner {
    pool: Vec<Arc<dyn Provider>>,
    selector: Selector,
}

/// Routing and failover engine over a fixed provider pool
///
/// Cheap to clone; hand one to every request-handling task instead of
/// reaching for a global.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Engine over an explicit pool, in pool order
    ///
    /// # Errors
    ///
    /// Returns `EngineError::EmptyPool` when the pool is empty.
    pub fn new(pool: Vec<Arc<dyn Provider>>) -> Result<Self, EngineError> {
        if pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }

        Ok(Self {
            inner: Arc::new(EngineInner {
                pool,
                selector: Selector::new(),
            }),
        })
    }

    /// Construct every configured provider eagerly and build the engine
    ///
    /// Entries that fail to construct are dropped with a warning; only an
    /// empty resulting pool is fatal.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::EmptyPool` when no provider survives.
    pub async fn from_config(configs: &[ProviderConfig]) -> Result<Self, EngineError> {
        let mut pool: Vec<Arc<dyn Provider>> = Vec::with_capacity(configs.len());

        for (index, config) in configs.iter().enumerate() {
            let name = config
                .name
                .clone()
                .unwrap_or_else(|| format!("{}-{index}", config.kind));

            match provider::build(config, name.clone()).await {
                Ok(provider) => {
                    tracing::info!(provider = %name, model = %config.model, "initialized provider");
                    pool.push(provider);
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "skipping provider that failed to initialize");
                }
            }
        }

        Self::new(pool)
    }

    /// Perform one non-streaming completion with cross-provider failover
    ///
    /// A singleton pool propagates the provider's own error directly; a
    /// larger pool is swept in pool order, skipping the provider that just
    /// failed, and only total exhaustion surfaces as an error.
    pub async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, EngineError> {
        let first = self
            .inner
            .selector
            .pick(&self.inner.pool, options.model.as_deref(), options.strategy())?;
        let provider = &self.inner.pool[first];

        match provider.complete(messages, options).await {
            Ok(response) => Ok(response),
            Err(error) => {
                tracing::warn!(provider = provider.name(), error = %error, "completion failed");

                if self.inner.pool.len() == 1 {
                    return Err(EngineError::Provider {
                        provider: provider.name().to_owned(),
                        source: error,
                    });
                }

                tracing::info!("attempting failover to remaining providers");
                let mut attempts = vec![FailedAttempt {
                    provider: provider.name().to_owned(),
                    error,
                }];

                for (index, candidate) in self.inner.pool.iter().enumerate() {
                    if index == first {
                        continue;
                    }

                    match candidate.complete(messages, options).await {
                        Ok(response) => return Ok(response),
                        Err(error) => {
                            tracing::warn!(provider = candidate.name(), error = %error, "failover provider failed");
                            attempts.push(FailedAttempt {
                                provider: candidate.name().to_owned(),
                                error,
                            });
                        }
                    }
                }

                Err(EngineError::AllProvidersFailed { attempts })
            }
        }
    }

    /// Perform one streaming completion with cross-provider failover
    ///
    /// All failures are delivered through the returned stream. A mid-stream
    /// failure restarts the whole conversation on the next untried provider
    /// and appends its chunks after whatever was already delivered — the
    /// caller may observe duplicated partial content in that case, and no
    /// rollback signal is emitted.
    pub fn complete_stream(&self, messages: Vec<Message>, options: CompletionOptions) -> EngineStream {
        let machine = StreamMachine {
            tried: vec![false; self.inner.pool.len()],
            attempts: Vec::new(),
            phase: Phase::Init,
            inner: Arc::clone(&self.inner),
            messages,
            options,
        };

        Box::pin(futures_util::stream::unfold(machine, StreamMachine::step))
    }

    /// Read-only snapshot of the pool; has no effect on routing
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            total_providers: self.inner.pool.len(),
            providers: self
                .inner
                .pool
                .iter()
                .enumerate()
                .map(|(index, provider)| ProviderStatus {
                    index,
                    name: provider.name().to_owned(),
                    kind: provider.kind(),
                    model: provider.model().to_owned(),
                })
                .collect(),
        }
    }
}

/// Snapshot of the provider pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    /// Number of live providers
    pub total_providers: usize,
    /// One entry per provider, in pool order
    pub providers: Vec<ProviderStatus>,
}

/// One provider's position and identity within the pool
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Ordinal position in the pool
    pub index: usize,
    /// Display name
    pub name: String,
    /// Backend kind
    pub kind: ProviderKind,
    /// Configured model name
    pub model: String,
}

enum Phase {
    Init,
    Active { index: usize, stream: ChunkStream },
    Finished,
}

/// Per-call state driving the streaming failover loop
struct StreamMachine {
    inner: Arc<EngineInner>,
    messages: Vec<Message>,
    options: CompletionOptions,
    tried: Vec<bool>,
    attempts: Vec<FailedAttempt>,
    phase: Phase,
}

impl StreamMachine {
    async fn step(mut self) -> Option<(Result<StreamChunk, EngineError>, Self)> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Finished => return None,
                Phase::Init => {
                    let index = match self.inner.selector.pick(
                        &self.inner.pool,
                        self.options.model.as_deref(),
                        self.options.strategy(),
                    ) {
                        Ok(index) => index,
                        Err(e) => return Some((Err(e), self)),
                    };

                    self.tried[index] = true;
                    let provider = Arc::clone(&self.inner.pool[index]);
                    match provider.complete_stream(&self.messages, &self.options).await {
                        Ok(stream) => self.phase = Phase::Active { index, stream },
                        Err(error) => {
                            if let Some(item) = self.handle_failure(index, error).await {
                                return Some((item, self));
                            }
                        }
                    }
                }
                Phase::Active { index, mut stream } => match stream.next().await {
                    Some(Ok(chunk)) => {
                        self.phase = Phase::Active { index, stream };
                        return Some((Ok(chunk), self));
                    }
                    None => return None,
                    Some(Err(error)) => {
                        if let Some(item) = self.handle_failure(index, error).await {
                            return Some((item, self));
                        }
                    }
                },
            }
        }
    }

    /// Record one failed attempt, then either finish with a terminal error
    /// item or restart on the next untried provider in pool order
    async fn handle_failure(&mut self, index: usize, error: ProviderError) -> Option<Result<StreamChunk, EngineError>> {
        let failed = &self.inner.pool[index];
        tracing::warn!(provider = failed.name(), error = %error, "streaming failed");

        if self.inner.pool.len() == 1 {
            return Some(Err(EngineError::Provider {
                provider: failed.name().to_owned(),
                source: error,
            }));
        }

        self.attempts.push(FailedAttempt {
            provider: failed.name().to_owned(),
            error,
        });

        for candidate in 0..self.inner.pool.len() {
            if self.tried[candidate] {
                continue;
            }
            self.tried[candidate] = true;

            let provider = Arc::clone(&self.inner.pool[candidate]);
            tracing::info!(provider = provider.name(), "failing over stream to next provider");

            match provider.complete_stream(&self.messages, &self.options).await {
                Ok(stream) => {
                    self.phase = Phase::Active {
                        index: candidate,
                        stream,
                    };
                    return None;
                }
                Err(error) => {
                    tracing::warn!(provider = provider.name(), error = %error, "failover provider failed");
                    self.attempts.push(FailedAttempt {
                        provider: provider.name().to_owned(),
                        error,
                    });
                }
            }
        }

        Some(Err(EngineError::AllProvidersFailed {
            attempts: std::mem::take(&mut self.attempts),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use crate::types::LoadBalanceStrategy;

    fn options() -> CompletionOptions {
        CompletionOptions::default()
    }

    fn messages() -> Vec<Message> {
        vec![Message::user("hi")]
    }

    #[tokio::test]
    async fn failover_returns_the_next_provider_response() {
        let a = MockProvider::failing("a", "m1");
        let b = MockProvider::healthy("b", "m1");
        let engine = Engine::new(vec![a.clone(), b.clone()]).unwrap();

        let response = engine.complete(&messages(), &options()).await.unwrap();
        assert_eq!(response.id, "resp-b");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_attempts_in_pool_order() {
        let engine = Engine::new(vec![
            MockProvider::failing("a", "m1"),
            MockProvider::failing("b", "m1"),
            MockProvider::failing("c", "m2"),
        ])
        .unwrap();

        let error = engine.complete(&messages(), &options()).await.unwrap_err();
        let EngineError::AllProvidersFailed { attempts } = error else {
            panic!("expected AllProvidersFailed, got {error}");
        };
        let order: Vec<&str> = attempts.iter().map(|a| a.provider.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn singleton_failure_propagates_the_provider_error() {
        let engine = Engine::new(vec![MockProvider::failing("only", "m1")]).unwrap();

        let error = engine.complete(&messages(), &options()).await.unwrap_err();
        assert!(matches!(error, EngineError::Provider { .. }));
    }

    #[tokio::test]
    async fn success_touches_only_the_selected_provider() {
        let a = MockProvider::healthy("a", "m1");
        let b = MockProvider::healthy("b", "m1");
        let engine = Engine::new(vec![a.clone(), b.clone()]).unwrap();

        let response = engine.complete(&messages(), &options()).await.unwrap();
        assert_eq!(response.id, "resp-a");
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn model_scoped_round_robin_keeps_independent_cursors() {
        let engine = Engine::new(vec![
            MockProvider::healthy("a", "m1"),
            MockProvider::healthy("b", "m1"),
            MockProvider::healthy("c", "m2"),
        ])
        .unwrap();

        let m1 = CompletionOptions {
            model: Some("m1".to_owned()),
            load_balance_strategy: Some(LoadBalanceStrategy::RoundRobin),
            ..CompletionOptions::default()
        };
        let m2 = CompletionOptions {
            model: Some("m2".to_owned()),
            ..m1.clone()
        };

        assert_eq!(engine.complete(&messages(), &m1).await.unwrap().id, "resp-a");
        assert_eq!(engine.complete(&messages(), &m1).await.unwrap().id, "resp-b");
        // The m2 cursor is untouched by the m1 calls
        assert_eq!(engine.complete(&messages(), &m2).await.unwrap().id, "resp-c");
    }

    #[tokio::test]
    async fn stream_failover_restarts_on_the_next_provider() {
        let engine = Engine::new(vec![
            MockProvider::failing_mid_stream("a", "m1"),
            MockProvider::healthy("b", "m1"),
        ])
        .unwrap();

        let chunks: Vec<_> = engine.complete_stream(messages(), options()).collect().await;
        let texts: Vec<String> = chunks
            .iter()
            .map(|item| {
                item.as_ref()
                    .expect("no errors expected")
                    .choices
                    .first()
                    .and_then(|c| c.delta.content.clone())
                    .unwrap_or_default()
            })
            .collect();

        // Chunks already delivered by the failed provider stay delivered
        assert_eq!(
            texts,
            vec![
                "partial from a".to_string(),
                "hello from b".to_string(),
                String::new()
            ]
        );
        assert!(chunks.last().unwrap().as_ref().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn stream_exhaustion_yields_a_terminal_error() {
        let engine = Engine::new(vec![
            MockProvider::failing("a", "m1"),
            MockProvider::failing("b", "m1"),
        ])
        .unwrap();

        let items: Vec<_> = engine.complete_stream(messages(), options()).collect().await;
        assert_eq!(items.len(), 1);
        let Err(EngineError::AllProvidersFailed { attempts }) = &items[0] else {
            panic!("expected AllProvidersFailed");
        };
        assert_eq!(attempts.len(), 2);
    }

    #[tokio::test]
    async fn singleton_stream_error_propagates_directly() {
        let engine = Engine::new(vec![MockProvider::failing_mid_stream("only", "m1")]).unwrap();

        let items: Vec<_> = engine.complete_stream(messages(), options()).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(EngineError::Provider { .. })));
    }

    #[tokio::test]
    async fn empty_pool_is_rejected_at_construction() {
        assert!(matches!(Engine::new(Vec::new()), Err(EngineError::EmptyPool)));
    }

    #[test]
    fn status_lists_providers_in_pool_order() {
        let engine = Engine::new(vec![
            MockProvider::healthy("a", "m1"),
            MockProvider::healthy("b", "m2"),
        ])
        .unwrap();

        let status = engine.status();
        assert_eq!(status.total_providers, 2);
        assert_eq!(status.providers[0].index, 0);
        assert_eq!(status.providers[1].model, "m2");
    }
}
