//! Simulation clock: owns the frame counter and pause state.
//!
//! Time inside the drum is measured in frames, never wall-clock, so a
//! headless run and a paced run with the same seed behave identically.

use crate::types::Frame;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_frame: Frame,
    pub frame_rate:    f64,
    pub paused:        bool,
}

impl SimClock {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            current_frame: 0,
            frame_rate,
            paused: true,
        }
    }

    /// Advance one frame. Returns the new frame number.
    pub fn advance(&mut self) -> Frame {
        debug_assert!(!self.paused, "advance() called on paused clock");
        self.current_frame += 1;
        self.current_frame
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    /// Simulated seconds since frame 0.
    pub fn elapsed_secs(&self) -> f64 {
        self.current_frame as f64 / self.frame_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_time_follows_frames() {
        let mut clock = SimClock::new(60.0);
        clock.resume();
        for _ in 0..90 {
            clock.advance();
        }
        assert_eq!(clock.current_frame, 90);
        assert!((clock.elapsed_secs() - 1.5).abs() < 1e-12);
    }
}
