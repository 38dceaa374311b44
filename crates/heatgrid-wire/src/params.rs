//! Run parameter schema
//!
//! - Bytes 0-7: Node interval (u64, microseconds)
//! - Bytes 8-15: Base interval (u64, microseconds)
//! - Bytes 16-19: Iteration budget (u32)

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use heatgrid_core::{HeatgridError, HeatgridResult, RunParams};

/// Encoded size of run parameters
pub const PARAMS_SIZE: usize = 20;

pub fn encode_params(params: &RunParams) -> Bytes {
    let mut buf = BytesMut::with_capacity(PARAMS_SIZE);
    buf.put_u64_le(params.node_interval.as_micros() as u64);
    buf.put_u64_le(params.base_interval.as_micros() as u64);
    buf.put_u32_le(params.iteration_budget);
    buf.freeze()
}

pub fn decode_params(mut buf: &[u8]) -> HeatgridResult<RunParams> {
    if buf.len() != PARAMS_SIZE {
        return Err(HeatgridError::BufferTooShort {
            expected: PARAMS_SIZE,
            actual: buf.len(),
        });
    }
    Ok(RunParams {
        node_interval: Duration::from_micros(buf.get_u64_le()),
        base_interval: Duration::from_micros(buf.get_u64_le()),
        iteration_budget: buf.get_u32_le(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_payload() {
        let params = RunParams {
            node_interval: Duration::from_millis(200),
            base_interval: Duration::from_millis(750),
            iteration_budget: 5,
        };
        let bytes = encode_params(&params);
        assert_eq!(bytes.len(), PARAMS_SIZE);
        assert_eq!(decode_params(&bytes).unwrap(), params);
        assert!(decode_params(&bytes[..12]).is_err());
    }
}
