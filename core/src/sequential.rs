//! Sequential (first-order Markov) strategy.
//!
//! Each historical draw is sorted ascending and read as a chain: the first
//! number feeds a start distribution, each consecutive pair feeds a
//! current → next count table. Generation walks the chain, excluding
//! numbers already picked.
//!
//! Main numbers are returned in generation order, never sorted.

use crate::{
    config::GameConfig,
    error::{DrawError, DrawResultOf},
    rng::{next_index, RandomSource},
    sampling::{pick_from_weights, WeightTable},
    strategy::DrawStrategy,
    types::{DrawHistory, Number},
};
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionModel {
    /// First (smallest) number of a draw → count.
    pub first:       WeightTable,
    /// current → (next → count).
    pub transitions: BTreeMap<Number, WeightTable>,
}

impl TransitionModel {
    /// Numbers outside `1..=total_numbers` are dropped; draws left with
    /// fewer than `main_count` distinct numbers are skipped.
    pub fn from_history(history: &DrawHistory, game: &GameConfig) -> Self {
        let mut model = Self::default();
        for draw in &history.draws {
            let mut sorted: Vec<Number> = draw
                .main
                .iter()
                .copied()
                .filter(|n| (1..=game.total_numbers).contains(n))
                .collect();
            sorted.sort_unstable();
            sorted.dedup();
            if sorted.len() < game.main_count {
                continue;
            }

            *model.first.entry(sorted[0]).or_insert(0.0) += 1.0;
            for pair in sorted.windows(2) {
                *model
                    .transitions
                    .entry(pair[0])
                    .or_default()
                    .entry(pair[1])
                    .or_insert(0.0) += 1.0;
            }
        }
        model
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// Observed successors of `current` that are not in `picked`.
    fn candidates(&self, current: Number, picked: &[Number]) -> Option<WeightTable> {
        let mut candidates = self.transitions.get(&current)?.clone();
        candidates.retain(|n, _| !picked.contains(n));
        (!candidates.is_empty()).then_some(candidates)
    }
}

pub struct SequentialStrategy {
    game: GameConfig,
}

impl SequentialStrategy {
    pub fn new(game: GameConfig) -> Self {
        Self { game }
    }

    /// Uniform pick, preferring numbers above `current` so the sequence
    /// keeps climbing the way sorted draws do. This preference mimics the
    /// look of real draws and is not derived from draw statistics.
    async fn fallback_pick(
        &self,
        current: Number,
        picked: &[Number],
        rng: &mut dyn RandomSource,
    ) -> DrawResultOf<Number> {
        let available: Vec<Number> =
            self.game.numbers().filter(|n| !picked.contains(n)).collect();
        let higher: Vec<Number> = available.iter().copied().filter(|n| *n > current).collect();
        let bucket = if higher.is_empty() { &available } else { &higher };
        if bucket.is_empty() {
            return Err(DrawError::GenerationInvariantViolation {
                attempts: 1,
                detail: "no numbers left to draw".into(),
            });
        }
        Ok(bucket[next_index(rng, bucket.len()).await])
    }
}

#[async_trait]
impl DrawStrategy for SequentialStrategy {
    fn name(&self) -> &'static str { "sequential" }

    fn preserves_order(&self) -> bool { true }

    async fn draw(
        &self,
        history: &DrawHistory,
        rng: &mut dyn RandomSource,
    ) -> DrawResultOf<Vec<Number>> {
        let model = TransitionModel::from_history(history, &self.game);
        if model.is_empty() {
            log::debug!(
                "{}; using uniform start and transitions",
                DrawError::InsufficientHistory { strategy: self.name() }
            );
        }

        let mut result: Vec<Number> = Vec::with_capacity(self.game.draw_count());

        let first = match pick_from_weights(&model.first, rng).await {
            Some(n) => n,
            None => next_index(rng, self.game.total_numbers as usize).await as Number + 1,
        };
        result.push(first);

        let mut current = first;
        while result.len() < self.game.main_count {
            let next = match model.candidates(current, &result) {
                Some(candidates) => pick_from_weights(&candidates, rng).await,
                None => None,
            };
            let next = match next {
                Some(n) => n,
                None => self.fallback_pick(current, &result, rng).await?,
            };
            result.push(next);
            current = next;
        }

        let remaining: Vec<Number> =
            self.game.numbers().filter(|n| !result.contains(n)).collect();
        if remaining.is_empty() {
            return Err(DrawError::GenerationInvariantViolation {
                attempts: 1,
                detail: "no number left for the bonus".into(),
            });
        }
        let bonus = remaining[next_index(rng, remaining.len()).await];
        result.push(bonus);

        log::debug!("sequential chain: {:?}", result);
        Ok(result)
    }
}
