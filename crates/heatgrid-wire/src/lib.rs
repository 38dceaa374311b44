//! Heatgrid Wire Protocol - Binary message schemas
//!
//! Every message on the fabric carries a [`Tag`] and a payload encoded by
//! one of the schemas below. All integers are little-endian.
//! - Scalar payloads (requests, readings, termination)
//! - Alert reports (variable length, bounded)
//! - Address records (fixed width)
//! - Run parameters (fixed width)

pub mod address;
pub mod params;
pub mod report;
pub mod scalar;
pub mod tag;

pub use address::*;
pub use params::*;
pub use report::*;
pub use scalar::*;
pub use tag::*;
