//! Single-integer payloads: confirmation requests, reading replies and the
//! termination signal

use bytes::{Buf, BufMut, Bytes, BytesMut};
use heatgrid_core::{HeatgridError, HeatgridResult, NodeIdentity, Reading};

/// Encoded size of a scalar payload
pub const SCALAR_SIZE: usize = 4;

/// Payload of a confirmation request
pub const REQUEST_MARKER: i32 = 0;

/// Payload of a termination signal
pub const TERMINATE_MARKER: i32 = 1;

pub fn encode_scalar(value: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(SCALAR_SIZE);
    buf.put_i32_le(value);
    buf.freeze()
}

pub fn decode_scalar(mut buf: &[u8]) -> HeatgridResult<i32> {
    if buf.len() != SCALAR_SIZE {
        return Err(HeatgridError::BufferTooShort {
            expected: SCALAR_SIZE,
            actual: buf.len(),
        });
    }
    Ok(buf.get_i32_le())
}

#[inline]
pub fn encode_reading(reading: Reading) -> Bytes {
    encode_scalar(reading)
}

#[inline]
pub fn decode_reading(buf: &[u8]) -> HeatgridResult<Reading> {
    decode_scalar(buf)
}

pub fn encode_identity(identity: &NodeIdentity) -> Bytes {
    Bytes::copy_from_slice(&identity.to_bytes())
}

pub fn decode_identity(buf: &[u8]) -> HeatgridResult<NodeIdentity> {
    let bytes: [u8; NodeIdentity::WIRE_SIZE] =
        buf.try_into().map_err(|_| HeatgridError::BufferTooShort {
            expected: NodeIdentity::WIRE_SIZE,
            actual: buf.len(),
        })?;
    NodeIdentity::from_bytes(bytes)
        .ok_or_else(|| HeatgridError::InvalidWireFormat("negative rank in identity".into()))
}
