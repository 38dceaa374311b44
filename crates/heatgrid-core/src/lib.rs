//! Heatgrid Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every part of the sensor grid:
//! - Ranks and node identities
//! - Readings, tolerance and quorum predicates
//! - Grid topology resolution
//! - Run configuration
//! - Wall clocks

pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod reading;
pub mod topology;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use id::*;
pub use reading::*;
pub use topology::*;
