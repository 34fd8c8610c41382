//! The drum simulation: turns ball physics into a draw.
//!
//! FRAME ORDER (fixed, never reordered):
//!   1. Integrate every ball (gravity, air jet, damping, move)
//!   2. Wall collision, per ball, right after it moves
//!   3. Pairwise ball collisions
//!   4. At most one extraction through the suction port
//!
//! RULES:
//!   - All randomness flows through the RandomSource handed to start/tick.
//!   - A ball leaves `balls` in the same frame it joins `extracted`, so
//!     balls + extracted always equals the full number range.
//!   - Once draw_count balls are out the run is Complete; further ticks
//!     are no-ops.
//!   - Time is counted in frames. Pacing against the wall clock belongs
//!     to the caller.

use crate::{
    clock::SimClock,
    config::{DrawConfig, DrumConfig, GameConfig},
    drum::{collide_wall, integrate, resolve_collisions, DrumGeometry, SimBall},
    error::{DrawError, DrawResultOf},
    event::SimEvent,
    rng::RandomSource,
    snapshot::{BallView, ColorBand, SimSnapshot},
    strategy::DrawStrategy,
    types::{DrawHistory, DrawResult, Number},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Frames between cooperative yields in a headless run.
const YIELD_EVERY: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimPhase {
    Idle,
    Running,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationState {
    pub balls:                Vec<SimBall>,
    /// Extraction order; never longer than draw_count.
    pub extracted:            Vec<Number>,
    /// Simulated time of the last extraction. None = the port is open.
    pub last_extraction_secs: Option<f64>,
    pub phase:                SimPhase,
    /// Cleared by stop() or on completion.
    pub running:              bool,
    pub clock:                SimClock,
    stall_reported:           bool,
}

impl SimulationState {
    pub fn idle(frame_rate: f64) -> Self {
        Self {
            balls: Vec::new(),
            extracted: Vec::new(),
            last_extraction_secs: None,
            phase: SimPhase::Idle,
            running: false,
            clock: SimClock::new(frame_rate),
            stall_reported: false,
        }
    }

    fn running_with(balls: Vec<SimBall>, frame_rate: f64) -> Self {
        let mut state = Self::idle(frame_rate);
        state.balls = balls;
        state.phase = SimPhase::Running;
        state.running = true;
        state.clock.resume();
        state
    }
}

/// Advance `state` by one frame and report what happened.
///
/// A stopped or finished state is returned untouched with no events.
pub async fn step(
    state: &mut SimulationState,
    geometry: &DrumGeometry,
    params: &DrumConfig,
    game: &GameConfig,
    rng: &mut dyn RandomSource,
) -> DrawResultOf<Vec<SimEvent>> {
    if !state.running || state.phase != SimPhase::Running {
        return Ok(Vec::new());
    }

    let frame = state.clock.advance();
    let now = state.clock.elapsed_secs();
    let mut events = Vec::new();

    for ball in state.balls.iter_mut() {
        integrate(ball, geometry, params, rng).await;
        collide_wall(ball, geometry, params.wall_tangential_damping);
    }
    resolve_collisions(&mut state.balls);

    if state.extracted.len() < game.draw_count() {
        if let Some(ball) = try_extract(state, geometry, params, now) {
            let position = state.extracted.len();
            log::debug!("Frame {frame}: ball {ball} extracted ({position}/{})", game.draw_count());
            events.push(SimEvent::BallExtracted { frame, ball, position });
        }
    }

    if state.extracted.len() == game.draw_count() {
        let result = DrawResult::from_sequence(&state.extracted, game, true)?;
        state.phase = SimPhase::Complete;
        state.running = false;
        state.clock.pause();
        log::info!(
            "Drum draw complete at frame {frame}: {:?} + {}",
            result.main,
            result.bonus
        );
        events.push(SimEvent::SimulationCompleted { frame, result });
        return Ok(events);
    }

    let idle_secs = now - state.last_extraction_secs.unwrap_or(0.0);
    if idle_secs >= params.stall_warning_secs && !state.stall_reported {
        log::warn!(
            "No extraction for {idle_secs:.1}s ({} of {} out, {} balls left)",
            state.extracted.len(),
            game.draw_count(),
            state.balls.len()
        );
        state.stall_reported = true;
        events.push(SimEvent::SimulationStalled {
            frame,
            idle_secs,
            extracted: state.extracted.len(),
        });
    }

    Ok(events)
}

/// First ball, in list order, sitting in the suction zone once the
/// extraction interval has elapsed.
fn try_extract(
    state: &mut SimulationState,
    geometry: &DrumGeometry,
    params: &DrumConfig,
    now: f64,
) -> Option<Number> {
    if let Some(last) = state.last_extraction_secs {
        if now - last < params.extraction_interval_secs {
            return None;
        }
    }
    let index = state
        .balls
        .iter()
        .position(|b| geometry.in_suction_zone(b.position()))?;
    let ball = state.balls.remove(index);
    state.extracted.push(ball.id);
    state.last_extraction_secs = Some(now);
    state.stall_reported = false;
    Some(ball.id)
}

// ── Driver ────────────────────────────────────────────────────────

/// Owns one drum and its state. Reusable: start() discards any previous
/// run, finished or not.
pub struct DrumSimulation {
    pub geometry: DrumGeometry,
    params:       DrumConfig,
    game:         GameConfig,
    state:        SimulationState,
}

impl DrumSimulation {
    pub fn new(config: &DrawConfig) -> Self {
        Self {
            geometry: DrumGeometry::from_config(&config.drum),
            params:   config.drum.clone(),
            game:     config.game.clone(),
            state:    SimulationState::idle(config.drum.frame_rate),
        }
    }

    /// Spawn one ball per number and begin running.
    pub async fn start(&mut self, rng: &mut dyn RandomSource) -> Vec<SimEvent> {
        let mut balls = Vec::with_capacity(self.game.total_numbers as usize);
        for id in self.game.numbers() {
            balls.push(SimBall::spawn(id, &self.geometry, &self.params, rng).await);
        }
        self.start_with_balls(balls)
    }

    /// Begin running from a prepared ball set (replays, tests).
    pub fn start_with_balls(&mut self, balls: Vec<SimBall>) -> Vec<SimEvent> {
        let count = balls.len();
        self.state = SimulationState::running_with(balls, self.params.frame_rate);
        log::debug!("Drum started with {count} balls");
        vec![SimEvent::SimulationStarted { frame: 0, balls: count }]
    }

    pub async fn tick(&mut self, rng: &mut dyn RandomSource) -> DrawResultOf<Vec<SimEvent>> {
        step(&mut self.state, &self.geometry, &self.params, &self.game, rng).await
    }

    /// Cancel a run in progress. Partial extractions stay visible until
    /// the next start() and are never resumed.
    pub fn stop(&mut self) -> Vec<SimEvent> {
        if !self.state.running {
            return Vec::new();
        }
        self.state.running = false;
        self.state.clock.pause();
        let frame = self.state.clock.current_frame;
        log::info!("Drum stopped at frame {frame} after {} extractions", self.state.extracted.len());
        vec![SimEvent::SimulationStopped { frame }]
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn phase(&self) -> SimPhase {
        self.state.phase
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Present only once the run is Complete.
    pub fn result(&self) -> Option<DrawResult> {
        if self.state.phase != SimPhase::Complete {
            return None;
        }
        DrawResult::from_sequence(&self.state.extracted, &self.game, true).ok()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            frame:        self.state.clock.current_frame,
            elapsed_secs: self.state.clock.elapsed_secs(),
            phase:        self.state.phase,
            running:      self.state.running,
            geometry:     self.geometry.clone(),
            balls: self
                .state
                .balls
                .iter()
                .map(|b| BallView {
                    id:     b.id,
                    x:      b.x,
                    y:      b.y,
                    radius: b.radius,
                    band:   ColorBand::for_number(b.id),
                })
                .collect(),
            extracted:    self.state.extracted.clone(),
        }
    }

    /// Tick headlessly until the draw completes, yielding to the runtime
    /// periodically.
    ///
    /// `max_frames` is a ceiling for headless callers only: `tick` itself
    /// never fails on a stall and keeps reporting it as a
    /// SimulationStalled event. Hitting the ceiling here stops the drum and
    /// returns SimulationStall so the orchestrator can fall back.
    pub async fn run_to_completion(
        &mut self,
        rng: &mut dyn RandomSource,
    ) -> DrawResultOf<DrawResult> {
        if self.state.phase == SimPhase::Idle {
            self.start(rng).await;
        }
        loop {
            if let Some(result) = self.result() {
                return Ok(result);
            }
            if !self.state.running {
                return Err(DrawError::GenerationInvariantViolation {
                    attempts: 1,
                    detail: "drum stopped before the draw completed".into(),
                });
            }
            let frame = self.state.clock.current_frame;
            if frame >= self.params.max_frames {
                log::warn!(
                    "Drum gave up after {frame} frames with {} of {} extracted",
                    self.state.extracted.len(),
                    self.game.draw_count()
                );
                self.stop();
                return Err(DrawError::SimulationStall { frames: frame });
            }
            self.tick(rng).await?;
            if frame % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }
    }
}

/// The drum as a pull-based strategy: one headless run per draw.
/// History is ignored.
pub struct SimulationStrategy {
    config: DrawConfig,
}

impl SimulationStrategy {
    pub fn new(config: DrawConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DrawStrategy for SimulationStrategy {
    fn name(&self) -> &'static str { "simulation" }

    async fn draw(
        &self,
        _history: &DrawHistory,
        rng: &mut dyn RandomSource,
    ) -> DrawResultOf<Vec<Number>> {
        let mut drum = DrumSimulation::new(&self.config);
        let result = drum.run_to_completion(rng).await?;
        Ok(result.as_sequence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::PseudoRandomSource;

    /// Suction zone covers the whole drum: one extraction per interval.
    fn greedy_port() -> DrawConfig {
        let mut config = DrawConfig::default();
        config.drum.suction_radius = 1_000.0;
        config
    }

    #[tokio::test]
    async fn idle_drum_does_nothing() {
        let mut drum = DrumSimulation::new(&DrawConfig::default());
        let mut rng = PseudoRandomSource::seeded(1);
        assert_eq!(drum.phase(), SimPhase::Idle);
        assert!(drum.tick(&mut rng).await.unwrap().is_empty());
        assert_eq!(drum.state().clock.current_frame, 0);
        assert!(drum.result().is_none());
    }

    #[tokio::test]
    async fn extractions_respect_the_interval() {
        let mut drum = DrumSimulation::new(&greedy_port());
        let mut rng = PseudoRandomSource::seeded(2);
        drum.start(&mut rng).await;

        let mut extraction_frames = Vec::new();
        while drum.is_running() {
            for event in drum.tick(&mut rng).await.unwrap() {
                if let SimEvent::BallExtracted { frame, .. } = event {
                    extraction_frames.push(frame);
                }
            }
        }
        assert_eq!(extraction_frames.len(), 7);
        assert_eq!(extraction_frames[0], 1, "port starts open");
        for pair in extraction_frames.windows(2) {
            assert!(pair[1] - pair[0] >= 30, "gap {:?}", pair);
        }
    }

    #[tokio::test]
    async fn completes_with_sorted_main_and_bonus_last() {
        let mut drum = DrumSimulation::new(&greedy_port());
        let mut rng = PseudoRandomSource::seeded(3);
        let result = drum.run_to_completion(&mut rng).await.unwrap();
        let order = drum.state().extracted.clone();
        assert_eq!(order.len(), 7);
        assert_eq!(result.bonus, order[6]);
        let mut main = order[..6].to_vec();
        main.sort_unstable();
        assert_eq!(result.main, main);
        assert_eq!(drum.phase(), SimPhase::Complete);
        assert_eq!(drum.state().balls.len(), 45 - 7);

        // Further ticks change nothing.
        let frame = drum.state().clock.current_frame;
        assert!(drum.tick(&mut rng).await.unwrap().is_empty());
        assert_eq!(drum.state().clock.current_frame, frame);
    }

    #[tokio::test]
    async fn stop_cancels_and_start_resets() {
        let mut drum = DrumSimulation::new(&greedy_port());
        let mut rng = PseudoRandomSource::seeded(4);
        drum.start(&mut rng).await;
        for _ in 0..40 {
            drum.tick(&mut rng).await.unwrap();
        }
        let events = drum.stop();
        assert!(matches!(events.as_slice(), [SimEvent::SimulationStopped { frame: 40 }]));
        assert!(drum.stop().is_empty());
        assert!(drum.tick(&mut rng).await.unwrap().is_empty());
        assert!(drum.result().is_none());
        assert!(drum.run_to_completion(&mut rng).await.is_err());

        drum.start(&mut rng).await;
        assert!(drum.state().extracted.is_empty());
        assert_eq!(drum.state().balls.len(), 45);
        assert_eq!(drum.state().clock.current_frame, 0);
    }

    #[tokio::test]
    async fn closed_port_stalls() {
        let mut config = DrawConfig::default();
        config.drum.suction_radius = 1e-9;
        config.drum.stall_warning_secs = 1.0;
        config.drum.max_frames = 300;
        let mut drum = DrumSimulation::new(&config);
        let mut rng = PseudoRandomSource::seeded(5);
        drum.start(&mut rng).await;

        let mut stalls = 0;
        for _ in 0..300 {
            for event in drum.tick(&mut rng).await.unwrap() {
                if let SimEvent::SimulationStalled { frame, .. } = event {
                    assert_eq!(frame, 60);
                    stalls += 1;
                }
            }
        }
        assert_eq!(stalls, 1, "warned once");

        let err = drum.run_to_completion(&mut rng).await.unwrap_err();
        assert!(matches!(err, DrawError::SimulationStall { frames: 300 }));
        assert!(!drum.is_running());
    }

    #[tokio::test]
    async fn snapshot_projects_remaining_balls() {
        let mut drum = DrumSimulation::new(&greedy_port());
        let mut rng = PseudoRandomSource::seeded(6);
        drum.start(&mut rng).await;
        drum.tick(&mut rng).await.unwrap();
        let snap = drum.snapshot();
        assert_eq!(snap.balls.len(), 44);
        assert_eq!(snap.extracted.len(), 1);
        assert_eq!(snap.phase, SimPhase::Running);
        assert!(snap.balls.iter().all(|b| b.band == ColorBand::for_number(b.id)));
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"phase\":\"running\""));
    }
}
