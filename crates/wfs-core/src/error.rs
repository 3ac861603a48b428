//! Error types for the WFS rendering core.
//!
//! Only synchronous, un-preparable conditions surface as `Result`s (§7).
//! Per-block recoverable conditions (ring overrun, worker underrun,
//! out-of-range parameters, NaN containment) are absorbed as lock-free
//! counters elsewhere and never produce a `WfsError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WfsError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    #[error("requested {requested} inputs/outputs exceeds capacity {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("geometry produced a non-finite value for input {input}, output {output}")]
    NonFiniteGeometry { input: usize, output: usize },

    #[error("engine must be prepared before this operation")]
    NotPrepared,

    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

pub type WfsResult<T> = Result<T, WfsError>;
