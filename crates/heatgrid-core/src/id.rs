//! Identity types for the sensor grid
//!
//! Every process on the message fabric is addressed by a [`Rank`]. Rank 0 is
//! the correlator (base station); ranks `1..=rows*cols` are grid workers.

use std::fmt;

use crate::Reading;

/// Fabric rank of a process
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rank(pub u32);

impl Rank {
    /// The correlator always sits at rank 0
    pub const BASE: Rank = Rank(0);

    #[inline]
    pub fn new(rank: u32) -> Self {
        Rank(rank)
    }

    /// Rank of the worker at row-major grid index `index`
    #[inline]
    pub fn worker(index: usize) -> Self {
        Rank(index as u32 + 1)
    }

    #[inline]
    pub fn is_base(self) -> bool {
        self == Rank::BASE
    }

    /// Row-major grid index of a worker rank, `None` for the base
    #[inline]
    pub fn worker_index(self) -> Option<usize> {
        if self.is_base() {
            None
        } else {
            Some(self.0 as usize - 1)
        }
    }

    /// Iterate over every worker rank of a grid with `workers` cells
    pub fn workers(workers: usize) -> impl Iterator<Item = Rank> {
        (0..workers).map(Rank::worker)
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rank({})", self.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grid coordinate (row, col)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub const fn new(row: i32, col: i32) -> Self {
        Coord { row, col }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Identity of a sensor node plus its latest reading
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct NodeIdentity {
    pub rank: Rank,
    pub coord: Coord,
    pub reading: Reading,
}

impl NodeIdentity {
    /// Encoded size: rank, row, col, reading as 32-bit ints
    pub const WIRE_SIZE: usize = 16;

    pub fn new(rank: Rank, coord: Coord) -> Self {
        NodeIdentity {
            rank,
            coord,
            reading: 0,
        }
    }

    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.reading = reading;
        self
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[0..4].copy_from_slice(&(self.rank.0 as i32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.coord.row.to_le_bytes());
        buf[8..12].copy_from_slice(&self.coord.col.to_le_bytes());
        buf[12..16].copy_from_slice(&self.reading.to_le_bytes());
        buf
    }

    /// Decode from the fixed 16-byte layout; negative ranks are rejected
    pub fn from_bytes(bytes: [u8; Self::WIRE_SIZE]) -> Option<Self> {
        let field = |i: usize| i32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let rank = field(0);
        if rank < 0 {
            return None;
        }
        Some(NodeIdentity {
            rank: Rank(rank as u32),
            coord: Coord::new(field(4), field(8)),
            reading: field(12),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_rank_layout() {
        assert_eq!(Rank::worker(0), Rank(1));
        assert_eq!(Rank(5).worker_index(), Some(4));
        assert_eq!(Rank::BASE.worker_index(), None);
        assert_eq!(Rank::workers(3).collect::<Vec<_>>(), vec![Rank(1), Rank(2), Rank(3)]);
    }

    #[test]
    fn test_identity_bytes() {
        let id = NodeIdentity::new(Rank(7), Coord::new(1, 2)).with_reading(95);
        let decoded = NodeIdentity::from_bytes(id.to_bytes()).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_identity_rejects_negative_rank() {
        let mut bytes = NodeIdentity::default().to_bytes();
        bytes[0..4].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(NodeIdentity::from_bytes(bytes).is_none());
    }
}
