use crate::types::Frame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrawError {
    /// Network or platform entropy failure. Recovered by dropping one tier;
    /// only escapes when a caller asks for a specific source directly.
    #[error("Entropy source '{source_name}' unavailable: {reason}")]
    EntropySourceUnavailable { source_name: &'static str, reason: String },

    #[error("Strategy '{strategy}' requires history but none was supplied")]
    InsufficientHistory { strategy: &'static str },

    #[error("Strategy '{strategy}' produced a pool too small to draw from")]
    PoolExhausted { strategy: &'static str },

    #[error("Draw invariant violated after {attempts} attempt(s): {detail}")]
    GenerationInvariantViolation { attempts: u32, detail: String },

    #[error("Simulation made no progress within {frames} frames")]
    SimulationStall { frames: Frame },

    #[error("No strategy registered for algorithm '{algorithm}'")]
    StrategyNotRegistered { algorithm: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DrawResultOf<T> = Result<T, DrawError>;
