//! Weighted sampling engine.
//!
//! Weight tables are built fresh from history on every draw, expanded into
//! a pool where each number's multiplicity is round(weight^power × scale),
//! and drawn without replacement.
//!
//! The pool is stored run-length encoded: `(number, multiplicity)` entries
//! addressed by cumulative index. Index i hits exactly the number the
//! flattened multiset would hold at position i, but memory stays at one
//! entry per number even for steep powers.
//!
//! Without-replacement uses draw-and-remove (every copy of a picked number
//! leaves the pool) instead of redraw-on-duplicate. The distribution is the
//! same as rejection sampling; the loop is bounded by the number of distinct
//! entries, so a degenerate source (e.g. one that always returns 0) cannot
//! spin forever.

use crate::{
    config::{GameConfig, SamplingConfig},
    error::{DrawError, DrawResultOf},
    rng::RandomSource,
    strategy::DrawStrategy,
    types::{DrawHistory, Number},
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Number → non-negative weight, iterated in ascending number order.
pub type WeightTable = BTreeMap<Number, f64>;

/// Multiplicities above this are clamped so pool sums stay exact in u64.
const MAX_MULTIPLICITY: f64 = 1e15;

// ── Pool ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Pool {
    entries: Vec<(Number, u64)>,
    len:     u64,
}

impl Pool {
    /// Expand a weight table. Numbers whose multiplicity rounds to 0 are absent.
    pub fn build(weights: &WeightTable, power: f64, scale: f64) -> Self {
        let mut entries = Vec::with_capacity(weights.len());
        let mut len = 0u64;
        for (&n, &w) in weights {
            if !(w > 0.0) {
                continue;
            }
            let raw = (w.powf(power) * scale).round();
            // Also filters NaN.
            if !(raw >= 1.0) {
                continue;
            }
            let count = raw.min(MAX_MULTIPLICITY) as u64;
            entries.push((n, count));
            len += count;
        }
        Self { entries, len }
    }

    /// Size of the flattened multiset.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Count of distinct numbers still in the pool.
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn multiplicity(&self, n: Number) -> u64 {
        self.entries
            .iter()
            .find(|(num, _)| *num == n)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// The number at flattened position `index`.
    pub fn number_at(&self, index: u64) -> Option<Number> {
        let mut remaining = index;
        for &(n, count) in &self.entries {
            if remaining < count {
                return Some(n);
            }
            remaining -= count;
        }
        None
    }

    /// Drop every copy of `n`.
    pub fn remove(&mut self, n: Number) {
        if let Some(pos) = self.entries.iter().position(|(num, _)| *num == n) {
            let (_, count) = self.entries.remove(pos);
            self.len -= count;
        }
    }
}

/// Draw `target` distinct numbers from the pool expansion of `weights`.
///
/// Fails with `PoolExhausted` when fewer than `target` distinct numbers
/// survive the expansion (all-zero weights included).
pub async fn pick_from_pool(
    weights: &WeightTable,
    power: f64,
    scale: f64,
    rng: &mut dyn RandomSource,
    target: usize,
) -> DrawResultOf<Vec<Number>> {
    let mut pool = Pool::build(weights, power, scale);
    if pool.distinct() < target {
        return Err(DrawError::PoolExhausted { strategy: "pool" });
    }

    let mut result = Vec::with_capacity(target);
    while result.len() < target {
        let r = rng.next_f64().await;
        let index = ((r * pool.len() as f64) as u64).min(pool.len() - 1);
        let n = pool
            .number_at(index)
            .ok_or(DrawError::PoolExhausted { strategy: "pool" })?;
        result.push(n);
        pool.remove(n);
    }
    Ok(result)
}

/// Roulette-wheel pick over a weight map.
///
/// Walks the table in key order subtracting weights from `r × total` and
/// returns the key that takes the running value to ≤ 0. Non-positive
/// weights are never returned. Returns None when no key has positive
/// weight.
pub async fn pick_from_weights(weights: &WeightTable, rng: &mut dyn RandomSource) -> Option<Number> {
    let total: f64 = weights.values().filter(|w| **w > 0.0).sum();
    if !(total > 0.0) {
        return None;
    }
    let mut remaining = rng.next_f64().await * total;
    for (&n, &w) in weights {
        if w <= 0.0 {
            continue;
        }
        remaining -= w;
        if remaining <= 0.0 {
            return Some(n);
        }
    }
    // Float precision: fall back to the first eligible key.
    weights.iter().find(|(_, w)| **w > 0.0).map(|(n, _)| *n)
}

// ── Weight construction ───────────────────────────────────────────

pub fn uniform_weights(game: &GameConfig) -> WeightTable {
    game.numbers().map(|n| (n, 1.0)).collect()
}

fn occurrence_counts(history: &DrawHistory, game: &GameConfig) -> BTreeMap<Number, u32> {
    let mut counts: BTreeMap<Number, u32> = game.numbers().map(|n| (n, 0)).collect();
    for n in history.main_numbers() {
        if let Some(c) = counts.get_mut(&n) {
            *c += 1;
        }
    }
    counts
}

/// Base 1, +1 per historical occurrence. Favours hot numbers.
pub fn flat_weights(history: &DrawHistory, game: &GameConfig) -> WeightTable {
    occurrence_counts(history, game)
        .into_iter()
        .map(|(n, c)| (n, 1.0 + c as f64))
        .collect()
}

/// Base 1.0; for each round from oldest to newest every weight decays by
/// `decay_rate` and numbers drawn that round gain `reward`.
pub fn adaptive_weights(
    history: &DrawHistory,
    game: &GameConfig,
    decay_rate: f64,
    reward: f64,
) -> WeightTable {
    let mut weights = uniform_weights(game);
    for draw in history.oldest_first() {
        for w in weights.values_mut() {
            *w *= decay_rate;
        }
        for n in &draw.main {
            if let Some(w) = weights.get_mut(n) {
                *w += reward;
            }
        }
    }
    weights
}

/// scale / (occurrences + 1). Favours cold numbers.
pub fn cold_weights(history: &DrawHistory, game: &GameConfig, scale: f64) -> WeightTable {
    occurrence_counts(history, game)
        .into_iter()
        .map(|(n, c)| (n, scale / (c as f64 + 1.0)))
        .collect()
}

// ── Pool-based strategies ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightScheme {
    /// Hot numbers: 1 + occurrences.
    Flat,
    /// Recency-decayed occurrences.
    Adaptive,
    /// Inverse frequency.
    Cold,
}

pub struct PoolStrategy {
    scheme:   WeightScheme,
    game:     GameConfig,
    sampling: SamplingConfig,
}

impl PoolStrategy {
    pub fn new(scheme: WeightScheme, game: GameConfig, sampling: SamplingConfig) -> Self {
        Self { scheme, game, sampling }
    }

    pub fn weights(&self, history: &DrawHistory) -> WeightTable {
        match self.scheme {
            WeightScheme::Flat => flat_weights(history, &self.game),
            WeightScheme::Adaptive => adaptive_weights(
                history,
                &self.game,
                self.sampling.adaptive_decay_rate,
                self.sampling.adaptive_reward,
            ),
            WeightScheme::Cold => cold_weights(history, &self.game, self.sampling.cold_scale),
        }
    }

    pub fn power(&self) -> f64 {
        match self.scheme {
            WeightScheme::Adaptive => self.sampling.adaptive_power,
            WeightScheme::Flat | WeightScheme::Cold => self.sampling.weighted_power,
        }
    }
}

#[async_trait]
impl DrawStrategy for PoolStrategy {
    fn name(&self) -> &'static str {
        match self.scheme {
            WeightScheme::Flat     => "flat_weighted",
            WeightScheme::Adaptive => "adaptive",
            WeightScheme::Cold     => "cold",
        }
    }

    async fn draw(
        &self,
        history: &DrawHistory,
        rng: &mut dyn RandomSource,
    ) -> DrawResultOf<Vec<Number>> {
        let target = self.game.draw_count();
        if history.is_empty() {
            log::debug!("{}: {}", self.name(), DrawError::InsufficientHistory { strategy: self.name() });
        }

        let weights = self.weights(history);
        match pick_from_pool(&weights, self.power(), self.sampling.pool_scale, rng, target).await {
            Err(DrawError::PoolExhausted { .. }) => {
                log::warn!(
                    "{}: {} after weighting, retrying with uniform weights",
                    self.name(),
                    DrawError::PoolExhausted { strategy: self.name() }
                );
                let uniform = uniform_weights(&self.game);
                pick_from_pool(&uniform, 1.0, self.sampling.pool_scale, rng, target).await
            }
            other => other,
        }
    }
}
