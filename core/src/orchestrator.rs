//! The draw orchestrator: one entry point for every algorithm.
//!
//! GENERATION ORDER:
//!   1. Resolve a RandomSource for the requested tier (degrading quietly)
//!   2. Build the requested strategy
//!   3. Draw, then normalise into a validated DrawResult
//!   4. On any error, fall back to flat-weighted + pseudorandom over an
//!      empty history (a uniform draw) until the attempt budget runs out
//!
//! RULES:
//!   - Every call owns its own source, pool, and simulation state.
//!   - History is borrowed read-only; the orchestrator never appends to it.

use crate::{
    config::DrawConfig,
    error::{DrawError, DrawResultOf},
    rng::{resolve_source, EntropyBeacon, RngType},
    sampling::{PoolStrategy, WeightScheme},
    sequential::SequentialStrategy,
    simulation::SimulationStrategy,
    strategy::{Algorithm, DrawStrategy, UniformStrategy},
    types::{DrawHistory, DrawResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A finished draw with the metadata a history log keeps for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub id:         Uuid,
    pub created_at: DateTime<Utc>,
    /// As requested, or the fallback pair when `fallback` is set. A tier
    /// that degraded inside resolve_source is still reported as requested.
    pub algorithm:  Algorithm,
    pub rng:        RngType,
    pub result:     DrawResult,
    /// True when the requested combination failed and the last-resort
    /// strategy produced the result.
    pub fallback:   bool,
}

impl DrawRecord {
    fn new(algorithm: Algorithm, rng: RngType, result: DrawResult, fallback: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            algorithm,
            rng,
            result,
            fallback,
        }
    }
}

pub struct DrawOrchestrator {
    config:      DrawConfig,
    beacon:      Option<Arc<dyn EntropyBeacon>>,
    learned:     Option<Arc<dyn DrawStrategy>>,
    next_stream: AtomicU64,
}

impl DrawOrchestrator {
    pub fn new(config: DrawConfig) -> Self {
        Self {
            config,
            beacon: None,
            learned: None,
            next_stream: AtomicU64::new(0),
        }
    }

    /// Hash service for the external tier. Without one, external requests
    /// degrade to the secure tier.
    pub fn with_beacon(mut self, beacon: Arc<dyn EntropyBeacon>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Strategy object served for Algorithm::Learned.
    pub fn with_learned(mut self, strategy: Arc<dyn DrawStrategy>) -> Self {
        self.learned = Some(strategy);
        self
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    pub fn strategy_for(&self, algorithm: Algorithm) -> DrawResultOf<Arc<dyn DrawStrategy>> {
        let game = self.config.game.clone();
        let sampling = self.config.sampling.clone();
        let strategy: Arc<dyn DrawStrategy> = match algorithm {
            Algorithm::FlatWeighted => Arc::new(PoolStrategy::new(WeightScheme::Flat, game, sampling)),
            Algorithm::Adaptive     => Arc::new(PoolStrategy::new(WeightScheme::Adaptive, game, sampling)),
            Algorithm::Cold         => Arc::new(PoolStrategy::new(WeightScheme::Cold, game, sampling)),
            Algorithm::Sequential   => Arc::new(SequentialStrategy::new(game)),
            Algorithm::Simulation   => Arc::new(SimulationStrategy::new(self.config.clone())),
            Algorithm::Random       => Arc::new(UniformStrategy::new(game)),
            Algorithm::Learned => match &self.learned {
                Some(strategy) => Arc::clone(strategy),
                None => {
                    return Err(DrawError::StrategyNotRegistered {
                        algorithm: algorithm.name().to_string(),
                    })
                }
            },
        };
        Ok(strategy)
    }

    /// Produce one validated draw. Strategy failures are absorbed by the
    /// fallback; only an exhausted attempt budget reaches the caller.
    pub async fn generate(
        &self,
        algorithm: Algorithm,
        rng_type: RngType,
        history: &DrawHistory,
    ) -> DrawResultOf<DrawRecord> {
        let first_error = match self.attempt(algorithm, rng_type, history).await {
            Ok(result) => {
                log::debug!("{algorithm}/{rng_type}: {:?} + {}", result.main, result.bonus);
                return Ok(DrawRecord::new(algorithm, rng_type, result, false));
            }
            Err(e) => e,
        };
        log::warn!(
            "{algorithm} draw with {rng_type} source failed: {first_error}; \
             falling back to flat_weighted with pseudorandom"
        );

        // The fallback ignores history so a skewed log cannot bias it.
        let no_history = DrawHistory::empty();
        let budget = self.config.sampling.max_attempts.max(2);
        let mut last_error = first_error.to_string();
        for attempt in 2..=budget {
            match self
                .attempt(Algorithm::FlatWeighted, RngType::Pseudorandom, &no_history)
                .await
            {
                Ok(result) => {
                    return Ok(DrawRecord::new(
                        Algorithm::FlatWeighted,
                        RngType::Pseudorandom,
                        result,
                        true,
                    ))
                }
                Err(e) => {
                    log::warn!("Fallback attempt {attempt}/{budget} failed: {e}");
                    last_error = e.to_string();
                }
            }
        }

        log::error!("{algorithm} draw abandoned after {budget} attempts");
        Err(DrawError::GenerationInvariantViolation {
            attempts: budget,
            detail: format!("{algorithm} failed ({first_error}); last fallback error: {last_error}"),
        })
    }

    async fn attempt(
        &self,
        algorithm: Algorithm,
        rng_type: RngType,
        history: &DrawHistory,
    ) -> DrawResultOf<DrawResult> {
        let strategy = self.strategy_for(algorithm)?;
        let stream = self.next_stream.fetch_add(1, Ordering::Relaxed);
        let mut rng = resolve_source(rng_type, &self.config.entropy, self.beacon.as_deref(), stream).await;
        let sequence = strategy.draw(history, rng.as_mut()).await?;
        DrawResult::from_sequence(&sequence, &self.config.game, !strategy.preserves_order())
    }
}
