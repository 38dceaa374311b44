//! Heatgrid Base - The correlator rank
//!
//! Two threads share one [`ReferenceTable`]:
//! - the [`ReferenceSimulator`] rewrites it slot by slot, forever
//! - the [`Correlator`] receives alert reports, verifies each against the
//!   table, keeps [`RunStatistics`] and a [`RunLog`], and drains the run by
//!   broadcasting termination to every worker

pub mod addresses;
pub mod correlator;
pub mod runlog;
pub mod simulator;
pub mod stats;
pub mod table;
pub mod termination;

pub use addresses::*;
pub use correlator::*;
pub use runlog::*;
pub use simulator::*;
pub use stats::*;
pub use table::*;
pub use termination::*;
