//! Drum simulation properties, observed through events and state.

use lotto_core::{
    config::DrawConfig,
    drum::SimBall,
    event::SimEvent,
    rng::PseudoRandomSource,
    simulation::{DrumSimulation, SimPhase, SimulationStrategy},
    strategy::DrawStrategy,
    types::DrawHistory,
};
use std::collections::HashSet;

/// Wide suction port so a full run finishes in a few hundred frames.
fn quick_drum() -> DrawConfig {
    let mut config = DrawConfig::default();
    config.drum.suction_radius = 1_000.0;
    config
}

#[tokio::test]
async fn each_extraction_removes_exactly_one_ball() {
    for seed in 0..5 {
        let mut drum = DrumSimulation::new(&quick_drum());
        let mut rng = PseudoRandomSource::seeded(seed);
        drum.start(&mut rng).await;

        let mut seen = HashSet::new();
        let mut completions = 0;
        while drum.is_running() {
            let before = drum.state().balls.len();
            let events = drum.tick(&mut rng).await.expect("tick");
            let after = drum.state().balls.len();

            let extracted: Vec<_> = events
                .iter()
                .filter_map(|e| match e {
                    SimEvent::BallExtracted { ball, .. } => Some(*ball),
                    _ => None,
                })
                .collect();
            assert!(extracted.len() <= 1, "at most one extraction per frame");
            assert_eq!(before - after, extracted.len(), "ball count must track extractions");
            for ball in extracted {
                assert!(seen.insert(ball), "ball {ball} extracted twice");
                assert!(drum.state().balls.iter().all(|b| b.id != ball));
            }
            assert_eq!(drum.state().balls.len() + drum.state().extracted.len(), 45);

            let done = events.iter().any(|e| matches!(e, SimEvent::SimulationCompleted { .. }));
            if done {
                completions += 1;
                assert_eq!(drum.state().extracted.len(), 7, "completes exactly at seven");
            } else {
                assert!(drum.state().extracted.len() < 7);
                assert_eq!(drum.phase(), SimPhase::Running);
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(drum.phase(), SimPhase::Complete);
    }
}

#[tokio::test]
async fn still_air_keeps_free_flight_velocity() {
    let mut config = DrawConfig::default();
    config.drum.gravity = 0.0;
    config.drum.turbulence = 0.0;
    config.drum.friction = 1.0;

    let mut drum = DrumSimulation::new(&config);
    let center = drum.geometry.center;
    // Starts in the jet corridor, inside the blast zone.
    let ball = SimBall {
        id: 1,
        x: center.x,
        y: center.y + 100.0,
        vx: 1.0,
        vy: -0.5,
        radius: 10.0,
        mass: 1.0,
        restitution: 0.85,
        friction: 1.0,
    };
    drum.start_with_balls(vec![ball]);

    let mut rng = PseudoRandomSource::seeded(9);
    for _ in 0..30 {
        drum.tick(&mut rng).await.expect("tick");
        let b = &drum.state().balls[0];
        assert_eq!((b.vx, b.vy), (1.0, -0.5));
    }
}

#[tokio::test]
async fn default_drum_produces_a_valid_draw() {
    let config = DrawConfig::default();
    let strategy = SimulationStrategy::new(config.clone());
    let mut rng = PseudoRandomSource::seeded(2024);
    let seq = strategy
        .draw(&DrawHistory::empty(), &mut rng)
        .await
        .expect("default drum should finish well inside max_frames");
    assert_eq!(seq.len(), 7);
    let unique: HashSet<_> = seq.iter().collect();
    assert_eq!(unique.len(), 7);
    assert!(seq.iter().all(|n| (1..=45).contains(n)));
    assert!(seq[..6].windows(2).all(|w| w[0] < w[1]), "main sorted: {seq:?}");
}
