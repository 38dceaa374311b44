//! Alert report schema
//!
//! Layout (little-endian):
//! - Bytes 0-7: Detection timestamp (i64, Unix seconds)
//! - Bytes 8-11: Match count (i32)
//! - Bytes 12-19: Detection start clock (f64, wall seconds)
//! - Bytes 20-35: Reporter identity (rank, row, col, reading as i32)
//! - Bytes 36-39: Neighbour count (i32)
//! - Then `neighbour count` identities of 16 bytes each

use bytes::{Buf, BufMut, Bytes, BytesMut};
use heatgrid_core::{HeatgridError, HeatgridResult, NodeIdentity};

/// Size of the fixed part of a report
pub const REPORT_HEADER_SIZE: usize = 40;

/// Upper bound on an encoded report
pub const MAX_REPORT_SIZE: usize = 1000;

/// Alert escalated by a node after a successful quorum round
#[derive(Clone, Debug, PartialEq)]
pub struct AlertReport {
    /// Wall-clock second at which the report was built
    pub detection_timestamp: i64,
    /// Neighbours whose reading matched the reporter's
    pub match_count: i32,
    /// High-resolution wall clock at send time, used for latency
    pub detection_start_clock: f64,
    /// The reporting node
    pub reporter: NodeIdentity,
    /// Every polled neighbour, in left/right/top/bottom order
    pub neighbors: Vec<NodeIdentity>,
}

impl AlertReport {
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Encoded size of this report
    pub fn size(&self) -> usize {
        REPORT_HEADER_SIZE + self.neighbors.len() * NodeIdentity::WIRE_SIZE
    }

    /// Serialize, failing instead of exceeding [`MAX_REPORT_SIZE`]
    pub fn encode(&self) -> HeatgridResult<Bytes> {
        let size = self.size();
        if size > MAX_REPORT_SIZE {
            return Err(HeatgridError::FrameTooLarge {
                size,
                limit: MAX_REPORT_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(size);
        buf.put_i64_le(self.detection_timestamp);
        buf.put_i32_le(self.match_count);
        buf.put_f64_le(self.detection_start_clock);
        buf.put_slice(&self.reporter.to_bytes());
        buf.put_i32_le(self.neighbors.len() as i32);
        for neighbor in &self.neighbors {
            buf.put_slice(&neighbor.to_bytes());
        }
        Ok(buf.freeze())
    }

    /// Parse a report; the buffer must hold exactly one report
    pub fn decode(buf: &[u8]) -> HeatgridResult<Self> {
        if buf.len() > MAX_REPORT_SIZE {
            return Err(HeatgridError::FrameTooLarge {
                size: buf.len(),
                limit: MAX_REPORT_SIZE,
            });
        }
        if buf.len() < REPORT_HEADER_SIZE {
            return Err(HeatgridError::BufferTooShort {
                expected: REPORT_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let mut cur = buf;
        let detection_timestamp = cur.get_i64_le();
        let match_count = cur.get_i32_le();
        let detection_start_clock = cur.get_f64_le();
        let reporter = read_identity(&mut cur)?;

        let count = cur.get_i32_le();
        if count < 0 {
            return Err(HeatgridError::InvalidWireFormat(format!(
                "negative neighbour count {}",
                count
            )));
        }
        let count = count as usize;

        let expected = count * NodeIdentity::WIRE_SIZE;
        if cur.remaining() < expected {
            return Err(HeatgridError::BufferTooShort {
                expected: REPORT_HEADER_SIZE + expected,
                actual: buf.len(),
            });
        }
        if cur.remaining() > expected {
            return Err(HeatgridError::InvalidWireFormat(format!(
                "{} trailing bytes after report",
                cur.remaining() - expected
            )));
        }

        let mut neighbors = Vec::with_capacity(count);
        for _ in 0..count {
            neighbors.push(read_identity(&mut cur)?);
        }

        Ok(AlertReport {
            detection_timestamp,
            match_count,
            detection_start_clock,
            reporter,
            neighbors,
        })
    }
}

fn read_identity(cur: &mut &[u8]) -> HeatgridResult<NodeIdentity> {
    let mut bytes = [0u8; NodeIdentity::WIRE_SIZE];
    cur.copy_to_slice(&mut bytes);
    NodeIdentity::from_bytes(bytes)
        .ok_or_else(|| HeatgridError::InvalidWireFormat("negative rank in identity".into()))
}
