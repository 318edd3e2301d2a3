//! Load-distribution policy over the provider pool

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rand::Rng;

use crate::error::EngineError;
use crate::provider::Provider;
use crate::types::LoadBalanceStrategy;

/// Picks a pool index for each call according to the requested strategy
///
/// Round-robin keeps one cursor per distinct candidate set — the full pool
/// has one, and each model-filtered subset gets its own on first use, so
/// selections against different subsets never interfere. Cursors advance
/// with an atomic fetch-add, so concurrent calls cannot skip or repeat an
/// assignment.
pub struct Selector {
    cursors: DashMap<Vec<usize>, AtomicUsize>,
}

impl Selector {
    /// Selector with no cursor state
    pub fn new() -> Self {
        Self {
            cursors: DashMap::new(),
        }
    }

    /// Choose a provider index from the pool
    ///
    /// When `requested_model` matches no configured model, selection falls
    /// back to the full pool; that fallback is logged, not an error.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::EmptyPool` when the pool itself is empty —
    /// unreachable for a correctly constructed engine.
    pub fn pick(
        &self,
        pool: &[Arc<dyn Provider>],
        requested_model: Option<&str>,
        strategy: LoadBalanceStrategy,
    ) -> Result<usize, EngineError> {
        if pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }

        let candidates = match requested_model {
            Some(model) => {
                let matching: Vec<usize> = pool
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.model() == model)
                    .map(|(i, _)| i)
                    .collect();

                if matching.is_empty() {
                    tracing::warn!(model, "no provider serves the requested model, using the full pool");
                    (0..pool.len()).collect()
                } else {
                    matching
                }
            }
            None => (0..pool.len()).collect(),
        };

        Ok(match strategy {
            LoadBalanceStrategy::FirstAvailable => candidates[0],
            LoadBalanceStrategy::Random => candidates[rand::rng().random_range(0..candidates.len())],
            LoadBalanceStrategy::RoundRobin => {
                let cursor = self.cursors.entry(candidates.clone()).or_default();
                let position = cursor.fetch_add(1, Ordering::Relaxed);
                candidates[position % candidates.len()]
            }
        })
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    fn pool(models: &[&str]) -> Vec<Arc<dyn Provider>> {
        models
            .iter()
            .enumerate()
            .map(|(i, model)| MockProvider::healthy(format!("p{i}"), *model) as Arc<dyn Provider>)
            .collect()
    }

    #[test]
    fn round_robin_cycles_in_pool_order() {
        let selector = Selector::new();
        let pool = pool(&["m1", "m2", "m3"]);

        let picks: Vec<usize> = (0..4)
            .map(|_| selector.pick(&pool, None, LoadBalanceStrategy::RoundRobin).unwrap())
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 0]);
    }

    #[test]
    fn first_available_is_deterministic() {
        let selector = Selector::new();
        let pool = pool(&["m1", "m2"]);

        for _ in 0..3 {
            assert_eq!(selector.pick(&pool, None, LoadBalanceStrategy::FirstAvailable).unwrap(), 0);
        }
    }

    #[test]
    fn model_filter_selects_the_only_match_under_every_strategy() {
        let selector = Selector::new();
        let pool = pool(&["m1", "m2", "m3"]);

        for strategy in [
            LoadBalanceStrategy::RoundRobin,
            LoadBalanceStrategy::Random,
            LoadBalanceStrategy::FirstAvailable,
        ] {
            for _ in 0..5 {
                assert_eq!(selector.pick(&pool, Some("m2"), strategy).unwrap(), 1);
            }
        }
    }

    #[test]
    fn unknown_model_falls_back_to_the_full_pool() {
        let selector = Selector::new();
        let pool = pool(&["m1", "m2"]);

        let pick = selector
            .pick(&pool, Some("no-such-model"), LoadBalanceStrategy::FirstAvailable)
            .unwrap();
        assert_eq!(pick, 0);
    }

    #[test]
    fn filtered_subsets_keep_independent_cursors() {
        let selector = Selector::new();
        let pool = pool(&["m1", "m1", "m2"]);

        // Two calls against the m1 subset return adjacent pool positions
        assert_eq!(selector.pick(&pool, Some("m1"), LoadBalanceStrategy::RoundRobin).unwrap(), 0);
        assert_eq!(selector.pick(&pool, Some("m1"), LoadBalanceStrategy::RoundRobin).unwrap(), 1);

        // The m2 subset has its own cursor, unaffected by the m1 one
        assert_eq!(selector.pick(&pool, Some("m2"), LoadBalanceStrategy::RoundRobin).unwrap(), 2);

        // And the full pool starts from its own cursor at zero
        assert_eq!(selector.pick(&pool, None, LoadBalanceStrategy::RoundRobin).unwrap(), 0);
    }

    #[test]
    fn random_stays_within_the_filtered_subset() {
        let selector = Selector::new();
        let pool = pool(&["m1", "m2", "m1"]);

        for _ in 0..20 {
            let pick = selector.pick(&pool, Some("m1"), LoadBalanceStrategy::Random).unwrap();
            assert!(pick == 0 || pick == 2);
        }
    }

    #[test]
    fn empty_pool_is_an_error() {
        let selector = Selector::new();
        let result = selector.pick(&[], None, LoadBalanceStrategy::RoundRobin);
        assert!(matches!(result, Err(EngineError::EmptyPool)));
    }
}
