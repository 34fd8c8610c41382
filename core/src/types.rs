//! Shared primitive types used across the draw engine.

use crate::config::GameConfig;
use crate::error::{DrawError, DrawResultOf};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A ball number. Always in 1..=total_numbers (45 by default).
pub type Number = u8;

/// A simulation frame. One frame = one physics tick.
pub type Frame = u64;

/// The canonical outcome of one draw: main numbers plus a single bonus.
///
/// Immutable once produced. `main` is ascending unless the producing
/// strategy is order-significant (the sequential strategy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub main:  Vec<Number>,
    pub bonus: Number,
}

impl DrawResult {
    /// Build from a raw draw sequence (main numbers first, bonus last).
    /// Extra trailing numbers are ignored.
    pub fn from_sequence(
        sequence: &[Number],
        game: &GameConfig,
        sort_main: bool,
    ) -> DrawResultOf<Self> {
        if sequence.len() < game.draw_count() {
            return Err(DrawError::GenerationInvariantViolation {
                attempts: 1,
                detail: format!(
                    "expected {} numbers, strategy produced {}",
                    game.draw_count(),
                    sequence.len()
                ),
            });
        }
        let mut main = sequence[..game.main_count].to_vec();
        if sort_main {
            main.sort_unstable();
        }
        let result = Self { main, bonus: sequence[game.main_count] };
        result.validate(game)?;
        Ok(result)
    }

    /// Check the structural invariants: right count, in range, all unique
    /// (bonus included).
    pub fn validate(&self, game: &GameConfig) -> DrawResultOf<()> {
        let violation = |detail: String| DrawError::GenerationInvariantViolation {
            attempts: 1,
            detail,
        };
        if self.main.len() != game.main_count {
            return Err(violation(format!(
                "expected {} main numbers, got {}",
                game.main_count,
                self.main.len()
            )));
        }
        let mut seen = HashSet::with_capacity(game.draw_count());
        for &n in self.main.iter().chain(std::iter::once(&self.bonus)) {
            if n == 0 || n > game.total_numbers {
                return Err(violation(format!("number {n} out of range 1..={}", game.total_numbers)));
            }
            if !seen.insert(n) {
                return Err(violation(format!("number {n} drawn twice")));
            }
        }
        Ok(())
    }

    /// Flattened form: main numbers followed by the bonus.
    pub fn as_sequence(&self) -> Vec<Number> {
        let mut seq = self.main.clone();
        seq.push(self.bonus);
        seq
    }
}

/// One past winning draw. Read-only input to the weighting strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDraw {
    #[serde(default)]
    pub round: Option<u32>,
    pub main:  Vec<Number>,
    #[serde(default)]
    pub bonus: Option<Number>,
}

impl HistoricalDraw {
    pub fn new(main: impl Into<Vec<Number>>) -> Self {
        Self { round: None, main: main.into(), bonus: None }
    }

    pub fn with_bonus(mut self, bonus: Number) -> Self {
        self.bonus = Some(bonus);
        self
    }
}

/// Which end of the history list holds the most recent draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrder {
    /// Index 0 is the latest draw (the export format of the draw archive).
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Externally owned, append-only log of past draws. The engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawHistory {
    pub draws: Vec<HistoricalDraw>,
    pub order: HistoryOrder,
}

impl DrawHistory {
    pub fn new(draws: Vec<HistoricalDraw>, order: HistoryOrder) -> Self {
        Self { draws, order }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Convenience for tests and fixtures: plain main-number rows.
    pub fn from_mains(rows: &[&[Number]], order: HistoryOrder) -> Self {
        let draws = rows.iter().map(|r| HistoricalDraw::new(r.to_vec())).collect();
        Self { draws, order }
    }

    /// Read the archive export: `[{"round": n, "main": [..], "bonus": b}, ...]`.
    pub fn from_json_file(path: impl AsRef<Path>, order: HistoryOrder) -> DrawResultOf<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DrawError::Config(format!("Cannot read {}: {e}", path.display())))?;
        let draws: Vec<HistoricalDraw> = serde_json::from_str(&content)?;
        log::debug!("Loaded {} past draws from {}", draws.len(), path.display());
        Ok(Self { draws, order })
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Iterate from the oldest draw to the newest, whatever the storage order.
    pub fn oldest_first(&self) -> Box<dyn Iterator<Item = &HistoricalDraw> + '_> {
        match self.order {
            HistoryOrder::OldestFirst => Box::new(self.draws.iter()),
            HistoryOrder::NewestFirst => Box::new(self.draws.iter().rev()),
        }
    }

    /// Iterate from the newest draw to the oldest.
    pub fn newest_first(&self) -> Box<dyn Iterator<Item = &HistoricalDraw> + '_> {
        match self.order {
            HistoryOrder::OldestFirst => Box::new(self.draws.iter().rev()),
            HistoryOrder::NewestFirst => Box::new(self.draws.iter()),
        }
    }

    /// Every main number ever drawn, in storage order.
    pub fn main_numbers(&self) -> impl Iterator<Item = Number> + '_ {
        self.draws.iter().flat_map(|d| d.main.iter().copied())
    }
}
