//! lotto-core: draw engine for a 6-of-45 lottery with one bonus ball.
//!
//! Two ways to draw: pull-based strategies that sample from weighted
//! pools built over past draws, and a push-based drum simulation that
//! extracts balls over many physics frames. DrawOrchestrator fronts both.

pub mod clock;
pub mod config;
pub mod drum;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod rng;
pub mod sampling;
pub mod sequential;
pub mod simulation;
pub mod snapshot;
pub mod strategy;
pub mod types;
