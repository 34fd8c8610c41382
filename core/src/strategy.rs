//! Draw strategy trait and the algorithm registry ids.
//!
//! RULE: Every generation strategy implements DrawStrategy.
//! A strategy reads history, pulls floats from the RandomSource it is
//! handed, and returns the raw draw sequence (main numbers first, bonus
//! last). Normalisation into a DrawResult is the orchestrator's job.

use crate::{
    config::GameConfig,
    error::{DrawError, DrawResultOf},
    rng::{next_index, RandomSource},
    types::{DrawHistory, Number},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The contract every pull-based strategy fulfils.
#[async_trait]
pub trait DrawStrategy: Send + Sync {
    /// Unique stable name for this strategy.
    fn name(&self) -> &'static str;

    /// True when the main numbers' generation order is meaningful and
    /// must not be sorted.
    fn preserves_order(&self) -> bool {
        false
    }

    /// Produce `main_count + 1` distinct numbers.
    async fn draw(
        &self,
        history: &DrawHistory,
        rng: &mut dyn RandomSource,
    ) -> DrawResultOf<Vec<Number>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    FlatWeighted,
    Adaptive,
    Cold,
    Sequential,
    Simulation,
    /// Plain uniform pick, no history.
    Random,
    /// Externally supplied strategy object (e.g. a trained model).
    Learned,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Self::FlatWeighted,
        Self::Adaptive,
        Self::Cold,
        Self::Sequential,
        Self::Simulation,
        Self::Random,
        Self::Learned,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::FlatWeighted => "flat_weighted",
            Self::Adaptive     => "adaptive",
            Self::Cold         => "cold",
            Self::Sequential   => "sequential",
            Self::Simulation   => "simulation",
            Self::Random       => "random",
            Self::Learned      => "learned",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = DrawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat_weighted" | "weighted"     => Ok(Self::FlatWeighted),
            "adaptive"                       => Ok(Self::Adaptive),
            "cold" | "non-frequency"         => Ok(Self::Cold),
            "sequential" | "markov"          => Ok(Self::Sequential),
            "simulation" | "physics"         => Ok(Self::Simulation),
            "random" | "uniform"             => Ok(Self::Random),
            "learned" | "ai"                 => Ok(Self::Learned),
            other => Err(DrawError::Config(format!("unknown algorithm '{other}'"))),
        }
    }
}

/// Uniform pick of distinct numbers, ignoring history.
pub struct UniformStrategy {
    game: GameConfig,
}

impl UniformStrategy {
    pub fn new(game: GameConfig) -> Self {
        Self { game }
    }
}

#[async_trait]
impl DrawStrategy for UniformStrategy {
    fn name(&self) -> &'static str { "random" }

    async fn draw(
        &self,
        _history: &DrawHistory,
        rng: &mut dyn RandomSource,
    ) -> DrawResultOf<Vec<Number>> {
        let mut available: Vec<Number> = self.game.numbers().collect();
        if available.len() < self.game.draw_count() {
            return Err(DrawError::PoolExhausted { strategy: self.name() });
        }
        let mut result = Vec::with_capacity(self.game.draw_count());
        while result.len() < self.game.draw_count() {
            let i = next_index(rng, available.len()).await;
            result.push(available.remove(i));
        }
        Ok(result)
    }
}
