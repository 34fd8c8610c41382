//! Events emitted by the drum simulation.
//!
//! RULE: Observers learn about the drum ONLY through events and snapshots.
//! A renderer or runner never reaches into SimulationState to detect an
//! extraction; it watches for BallExtracted.

use crate::types::{DrawResult, Frame, Number};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    SimulationStarted {
        frame: Frame,
        balls: usize,
    },
    BallExtracted {
        frame:    Frame,
        ball:     Number,
        /// 1-based extraction order; the last one is the bonus.
        position: usize,
    },
    SimulationCompleted {
        frame:  Frame,
        result: DrawResult,
    },
    /// No extraction for longer than the stall-warning window.
    SimulationStalled {
        frame:        Frame,
        idle_secs:    f64,
        extracted:    usize,
    },
    SimulationStopped {
        frame: Frame,
    },
}

impl SimEvent {
    /// Stable name of the variant, matching its serialized tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SimulationStarted { .. }   => "simulation_started",
            Self::BallExtracted { .. }       => "ball_extracted",
            Self::SimulationCompleted { .. } => "simulation_completed",
            Self::SimulationStalled { .. }   => "simulation_stalled",
            Self::SimulationStopped { .. }   => "simulation_stopped",
        }
    }

    pub fn frame(&self) -> Frame {
        match self {
            Self::SimulationStarted { frame, .. }
            | Self::BallExtracted { frame, .. }
            | Self::SimulationCompleted { frame, .. }
            | Self::SimulationStalled { frame, .. }
            | Self::SimulationStopped { frame } => *frame,
        }
    }
}
