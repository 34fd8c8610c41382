//! Statistical behaviour of the weighted strategies.
//!
//! Trials use seeded PseudoRandomSources so every run sees the same
//! samples; thresholds leave wide margins around the expected values.

use async_trait::async_trait;
use lotto_core::{
    config::{GameConfig, SamplingConfig},
    rng::{PseudoRandomSource, RandomSource, RngType},
    sampling::{pick_from_weights, PoolStrategy, WeightScheme, WeightTable},
    strategy::DrawStrategy,
    types::{DrawHistory, HistoryOrder, Number},
};

struct FixedSource(f64);

#[async_trait]
impl RandomSource for FixedSource {
    fn kind(&self) -> RngType { RngType::Pseudorandom }

    async fn next_f64(&mut self) -> f64 {
        self.0
    }
}

fn strategy(scheme: WeightScheme) -> PoolStrategy {
    PoolStrategy::new(scheme, GameConfig::default(), SamplingConfig::default())
}

/// Share of `trials` draws (main + bonus) that contain `n`.
async fn pick_rate(scheme: WeightScheme, history: &DrawHistory, n: Number, trials: u32, seed: u64) -> f64 {
    let strategy = strategy(scheme);
    let mut rng = PseudoRandomSource::seeded(seed);
    let mut hits = 0;
    for _ in 0..trials {
        let seq = strategy.draw(history, &mut rng).await.expect("draw");
        if seq.contains(&n) {
            hits += 1;
        }
    }
    hits as f64 / trials as f64
}

/// 30 draws, all containing 7; the other five slide across 8..=44.
fn seven_heavy_history() -> DrawHistory {
    let draws: Vec<Vec<Number>> = (0..30u8)
        .map(|i| {
            let base = (i * 5) % 33 + 8;
            vec![7, base, base + 1, base + 2, base + 3, base + 4]
        })
        .collect();
    let rows: Vec<&[Number]> = draws.iter().map(Vec::as_slice).collect();
    DrawHistory::from_mains(&rows, HistoryOrder::NewestFirst)
}

#[tokio::test]
async fn flat_and_cold_are_duals() {
    let history = seven_heavy_history();
    let uniform = 7.0 / 45.0;

    let flat = pick_rate(WeightScheme::Flat, &history, 7, 1_000, 1).await;
    let cold = pick_rate(WeightScheme::Cold, &history, 7, 1_000, 2).await;

    assert!(flat > uniform, "flat-weighted should favour 7: {flat:.3} vs {uniform:.3}");
    assert!(cold < uniform, "cold should avoid 7: {cold:.3} vs {uniform:.3}");
    assert!(flat > cold);
}

#[tokio::test]
async fn adaptive_amplifies_recent_draws() {
    // Oldest first; 45 never appears.
    let older: Vec<Vec<Number>> = (0..10u8)
        .map(|i| (0..6).map(|k| (i * 4 + k * 7) % 44 + 1).collect())
        .collect();
    let mut rows: Vec<&[Number]> = older.iter().map(Vec::as_slice).collect();
    let without = DrawHistory::from_mains(&rows, HistoryOrder::OldestFirst);

    let recent: &[Number] = &[2, 13, 22, 31, 40, 45];
    rows.push(recent);
    let with = DrawHistory::from_mains(&rows, HistoryOrder::OldestFirst);

    let before = pick_rate(WeightScheme::Adaptive, &without, 45, 1_000, 3).await;
    let after = pick_rate(WeightScheme::Adaptive, &with, 45, 1_000, 3).await;
    assert!(after >= before, "recent draw must not lower 45's rate: {before:.3} → {after:.3}");
    assert!(after > before);
}

#[tokio::test]
async fn adaptive_reads_history_in_either_direction() {
    let rows: [&[Number]; 3] = [&[1, 2, 3, 4, 5, 6], &[7, 8, 9, 10, 11, 12], &[13, 14, 15, 16, 17, 18]];
    let newest_first = DrawHistory::from_mains(&rows, HistoryOrder::NewestFirst);
    let reversed: Vec<&[Number]> = rows.iter().rev().copied().collect();
    let oldest_first = DrawHistory::from_mains(&reversed, HistoryOrder::OldestFirst);

    let s = strategy(WeightScheme::Adaptive);
    assert_eq!(s.weights(&newest_first), s.weights(&oldest_first));
    // The newest round carries the least decay.
    let w = s.weights(&newest_first);
    assert!(w[&1] > w[&7] && w[&7] > w[&13]);
}

#[tokio::test]
async fn repeated_draw_dominates_with_zero_stub() {
    let row: &[Number] = &[1, 2, 3, 4, 5, 6];
    let history = DrawHistory::from_mains(&[row, row], HistoryOrder::NewestFirst);
    let strategy = strategy(WeightScheme::Flat);

    let mut concentrated = 0;
    for _ in 0..100 {
        let seq = strategy.draw(&history, &mut FixedSource(0.0)).await.expect("draw");
        let hits = seq[..6].iter().filter(|n| (1..=6).contains(*n)).count();
        if hits >= 4 {
            concentrated += 1;
        }
    }
    assert!(concentrated >= 80, "only {concentrated}/100 trials concentrated on 1..=6");
}

#[tokio::test]
async fn zero_weight_is_never_picked() {
    let weights: WeightTable = [(1, 1.0), (2, 0.0)].into_iter().collect();
    for r in [0.0, 0.5, 0.99] {
        assert_eq!(pick_from_weights(&weights, &mut FixedSource(r)).await, Some(1));
    }
}

#[tokio::test]
async fn empty_history_draws_uniformly() {
    let empty = DrawHistory::empty();
    for scheme in [WeightScheme::Flat, WeightScheme::Adaptive, WeightScheme::Cold] {
        let rate = pick_rate(scheme, &empty, 45, 2_000, 4).await;
        assert!((rate - 7.0 / 45.0).abs() < 0.05, "{scheme:?}: {rate:.3}");
    }
}
