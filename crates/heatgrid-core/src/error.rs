//! Error types for the heatgrid simulation

use std::time::Duration;

use thiserror::Error;

use crate::Rank;

/// Core heatgrid errors
#[derive(Error, Debug)]
pub enum HeatgridError {
    // Configuration errors
    #[error("Grid mismatch: {rows} x {cols} = {} != {workers} workers", .rows * .cols)]
    GridMismatch {
        rows: usize,
        cols: usize,
        workers: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Field {field} too long: limit {limit}, got {actual}")]
    FieldTooLong {
        field: &'static str,
        limit: usize,
        actual: usize,
    },

    #[error("Frame too large: {size} > {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Unknown message tag: {0}")]
    UnknownTag(u8),

    // Fabric errors
    #[error("Unknown rank: {0}")]
    UnknownRank(Rank),

    #[error("Fabric closed")]
    FabricClosed,

    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(Duration, &'static str),

    // Output errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HeatgridError {
    /// True for errors that must abort the run before any worker starts
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            HeatgridError::GridMismatch { .. } | HeatgridError::InvalidConfig(_)
        )
    }
}

/// Result type for heatgrid operations
pub type HeatgridResult<T> = Result<T, HeatgridError>;
