//! Heatgrid Fabric - Message-passing layer between ranks
//!
//! This crate provides:
//! - The [`Endpoint`] trait: tag-addressed blocking and non-blocking
//!   send/receive, any-source receive, probe, idempotent cancel, broadcast
//! - [`MemoryFabric`]: an in-process fabric where every rank is a thread

pub mod endpoint;
pub mod memory;

pub use endpoint::*;
pub use memory::*;
