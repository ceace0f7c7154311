//! Error types for value conversions

use thiserror::Error;

/// Errors raised when building a value from raw input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// Channel width not one of 20/40/80/160/320 MHz
    #[error("unsupported channel width: {0} MHz")]
    InvalidChannelWidth(u16),

    /// Modulation tier out of range
    #[error("invalid modulation tier: {0}")]
    InvalidModulationTier(u8),
}
