use crate::error::{DrawError, DrawResultOf};
use crate::types::{HistoryOrder, Number};
use serde::{Deserialize, Serialize};

// ── Game shape ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub total_numbers: Number,
    pub main_count:    usize,
    pub bonus_count:   usize,
}

impl GameConfig {
    /// Numbers produced per draw: main plus bonus.
    pub fn draw_count(&self) -> usize {
        self.main_count + self.bonus_count
    }

    /// 1..=total_numbers, ascending.
    pub fn numbers(&self) -> impl Iterator<Item = Number> {
        1..=self.total_numbers
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { total_numbers: 45, main_count: 6, bonus_count: 1 }
    }
}

// ── Weighted sampling ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Skew exponent for the flat-weighted and cold strategies.
    pub weighted_power:      f64,
    /// Skew exponent for the adaptive strategy.
    pub adaptive_power:      f64,
    /// Per-round multiplier applied to every adaptive weight (< 1).
    pub adaptive_decay_rate: f64,
    /// Added to a number's adaptive weight for each round it appeared in.
    pub adaptive_reward:     f64,
    /// Numerator of the inverse-frequency weight.
    pub cold_scale:          f64,
    /// Pool multiplicity = round(weight^power × pool_scale).
    pub pool_scale:          f64,
    /// Attempt budget before a draw is declared an invariant violation.
    pub max_attempts:        u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            weighted_power:      1.0,
            adaptive_power:      10.0,
            adaptive_decay_rate: 0.96,
            adaptive_reward:     0.3,
            cold_scale:          100.0,
            pool_scale:          10.0,
            max_attempts:        3,
        }
    }
}

// ── Drum machine ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrumConfig {
    pub canvas_width:  f64,
    pub canvas_height: f64,
    pub drum_radius:   f64,
    pub suction_radius: f64,
    /// Distance of the suction centre below the top of the drum.
    pub suction_offset: f64,
    pub jet_width:     f64,
    pub jet_height:    f64,
    pub ball_radius:   f64,

    pub gravity:       f64,
    pub turbulence:    f64,
    pub restitution:   f64,
    /// Per-tick velocity multiplier (1.0 = no damping).
    pub friction:      f64,
    pub wall_tangential_damping: f64,
    /// Ball mass is 1.0 ± mass_jitter / 2.
    pub mass_jitter:   f64,
    /// Spawn velocity components are uniform in ±spawn_speed / 2.
    pub spawn_speed:   f64,
    /// Balls spawn at most drum_radius - spawn_margin from the centre.
    pub spawn_margin:  f64,

    pub blast_lift_factor:     f64,
    pub blast_chaos:           f64,
    pub blast_jitter:          f64,
    pub dispersal_lift_factor: f64,
    pub dispersal_jitter:      f64,

    pub extraction_interval_secs: f64,
    pub frame_rate:               f64,
    pub stall_warning_secs:       f64,
    /// Hard frame ceiling for a headless run.
    pub max_frames:               u64,
}

impl Default for DrumConfig {
    fn default() -> Self {
        Self {
            canvas_width:  600.0,
            canvas_height: 400.0,
            drum_radius:   150.0,
            suction_radius: 25.0,
            suction_offset: 20.0,
            jet_width:     60.0,
            jet_height:    100.0,
            ball_radius:   10.0,

            gravity:       0.3,
            turbulence:    5.0,
            restitution:   0.85,
            friction:      0.99,
            wall_tangential_damping: 0.05,
            mass_jitter:   0.05,
            spawn_speed:   15.0,
            spawn_margin:  20.0,

            blast_lift_factor:     0.8,
            blast_chaos:           2.0,
            blast_jitter:          2.0,
            dispersal_lift_factor: 0.1,
            dispersal_jitter:      5.0,

            extraction_interval_secs: 0.5,
            frame_rate:               60.0,
            stall_warning_secs:       30.0,
            max_frames:               216_000, // one hour at 60 Hz
        }
    }
}

// ── Entropy collaborators ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyConfig {
    /// Endpoint returning the latest block hash as plain text.
    pub beacon_url:          String,
    pub beacon_timeout_secs: u64,
    /// Fixes the pseudorandom stream. None = seed from OS entropy.
    #[serde(default)]
    pub pseudorandom_seed:   Option<u64>,
    /// Fixes the verifiable source's session seed. None = current time.
    #[serde(default)]
    pub verifiable_seed:     Option<u64>,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            beacon_url:          "https://blockchain.info/q/latesthash?cors=true".into(),
            beacon_timeout_secs: 5,
            pseudorandom_seed:   None,
            verifiable_seed:     None,
        }
    }
}

// ── Top level ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DrawConfig {
    #[serde(default)]
    pub game:          GameConfig,
    #[serde(default)]
    pub sampling:      SamplingConfig,
    #[serde(default)]
    pub drum:          DrumConfig,
    #[serde(default)]
    pub entropy:       EntropyConfig,
    #[serde(default)]
    pub history_order: HistoryOrder,
}

impl DrawConfig {
    /// Load from the data/ directory.
    /// In tests, use DrawConfig::default().
    pub fn load(data_dir: &str) -> DrawResultOf<Self> {
        let path = format!("{data_dir}/draw_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| DrawError::Config(format!("Cannot read {path}: {e}")))?;
        let config: DrawConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded draw config from {path}");
        Ok(config)
    }

    pub fn validate(&self) -> DrawResultOf<()> {
        let g = &self.game;
        if g.bonus_count != 1 {
            return Err(DrawError::Config(format!(
                "bonus_count must be 1, got {}",
                g.bonus_count
            )));
        }
        if g.main_count == 0 || g.draw_count() > g.total_numbers as usize {
            return Err(DrawError::Config(format!(
                "cannot draw {} of {} numbers",
                g.draw_count(),
                g.total_numbers
            )));
        }

        let s = &self.sampling;
        if !(s.adaptive_decay_rate > 0.0 && s.adaptive_decay_rate < 1.0) {
            return Err(DrawError::Config(format!(
                "adaptive_decay_rate must be in (0, 1), got {}",
                s.adaptive_decay_rate
            )));
        }
        if s.pool_scale <= 0.0 || s.max_attempts == 0 {
            return Err(DrawError::Config("pool_scale and max_attempts must be positive".into()));
        }

        let d = &self.drum;
        if d.drum_radius <= d.ball_radius || d.ball_radius <= 0.0 || d.suction_radius <= 0.0 {
            return Err(DrawError::Config(format!(
                "invalid drum geometry: drum_radius={} ball_radius={} suction_radius={}",
                d.drum_radius, d.ball_radius, d.suction_radius
            )));
        }
        if d.frame_rate <= 0.0 {
            return Err(DrawError::Config("frame_rate must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DrawConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_impossible_game() {
        let mut config = DrawConfig::default();
        config.game.total_numbers = 6;
        assert!(matches!(config.validate(), Err(DrawError::Config(_))));
    }

    #[test]
    fn rejects_growing_decay() {
        let mut config = DrawConfig::default();
        config.sampling.adaptive_decay_rate = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: DrawConfig =
            serde_json::from_str(r#"{"history_order": "oldest_first"}"#).unwrap();
        assert_eq!(config.history_order, HistoryOrder::OldestFirst);
        assert_eq!(config.game, GameConfig::default());
    }
}
