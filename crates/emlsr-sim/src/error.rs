//! Error types for the simulation layer

use emlsr_mux::ConfigError;
use thiserror::Error;

/// Errors loading or preparing a scenario
#[derive(Debug, Error)]
pub enum SimError {
    /// Scenario file is not valid JSON for the expected shape
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// Coordinator config rejected
    #[error("invalid coordinator config: {0}")]
    Config(#[from] ConfigError),

    /// Script steps must be in time order
    #[error("script step {index} at {at_us}us is earlier than the step before it")]
    UnsortedScript {
        /// Index of the offending step
        index: usize,
        /// Its time (microseconds)
        at_us: u64,
    },
}
