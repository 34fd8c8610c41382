//! Snapshot projection: drum state as a renderer sees it.
//!
//! A snapshot is read-only and serializable. Renderers draw from it and
//! never mutate simulation state.

use crate::{
    drum::DrumGeometry,
    simulation::SimPhase,
    types::{Frame, Number},
};
use serde::{Deserialize, Serialize};

/// Ball colour by number band, as printed on physical balls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBand {
    Yellow, // 1-10
    Blue,   // 11-20
    Red,    // 21-30
    Grey,   // 31-40
    Green,  // 41+
}

impl ColorBand {
    pub fn for_number(n: Number) -> Self {
        match n {
            0..=10  => Self::Yellow,
            11..=20 => Self::Blue,
            21..=30 => Self::Red,
            31..=40 => Self::Grey,
            _       => Self::Green,
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            Self::Yellow => "#fbc400",
            Self::Blue   => "#69c8f2",
            Self::Red    => "#ff7272",
            Self::Grey   => "#aaaaaa",
            Self::Green  => "#b0d840",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallView {
    pub id:     Number,
    pub x:      f64,
    pub y:      f64,
    pub radius: f64,
    pub band:   ColorBand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub frame:        Frame,
    pub elapsed_secs: f64,
    pub phase:        SimPhase,
    pub running:      bool,
    pub geometry:     DrumGeometry,
    pub balls:        Vec<BallView>,
    /// Extraction order so far.
    pub extracted:    Vec<Number>,
}
