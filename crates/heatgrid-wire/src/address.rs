//! Address record schema
//!
//! Sent once per worker to the correlator at startup. Two fixed-width,
//! NUL-padded ASCII fields:
//! - Bytes 0-17: MAC address
//! - Bytes 18-33: IP address

use bytes::{BufMut, Bytes, BytesMut};
use heatgrid_core::{HeatgridError, HeatgridResult};

/// Width of the MAC field
pub const MAC_FIELD_SIZE: usize = 18;

/// Width of the IP field
pub const IP_FIELD_SIZE: usize = 16;

/// Encoded size of an address record
pub const ADDRESS_RECORD_SIZE: usize = MAC_FIELD_SIZE + IP_FIELD_SIZE;

/// Network addresses a worker reports for the run log
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AddressRecord {
    pub mac: String,
    pub ip: String,
}

impl AddressRecord {
    pub fn new(mac: impl Into<String>, ip: impl Into<String>) -> Self {
        AddressRecord {
            mac: mac.into(),
            ip: ip.into(),
        }
    }

    pub fn encode(&self) -> HeatgridResult<Bytes> {
        let mut buf = BytesMut::with_capacity(ADDRESS_RECORD_SIZE);
        put_fixed(&mut buf, "mac", &self.mac, MAC_FIELD_SIZE)?;
        put_fixed(&mut buf, "ip", &self.ip, IP_FIELD_SIZE)?;
        Ok(buf.freeze())
    }

    pub fn decode(buf: &[u8]) -> HeatgridResult<Self> {
        if buf.len() != ADDRESS_RECORD_SIZE {
            return Err(HeatgridError::BufferTooShort {
                expected: ADDRESS_RECORD_SIZE,
                actual: buf.len(),
            });
        }
        Ok(AddressRecord {
            mac: get_fixed(&buf[..MAC_FIELD_SIZE])?,
            ip: get_fixed(&buf[MAC_FIELD_SIZE..])?,
        })
    }
}

fn put_fixed(buf: &mut BytesMut, field: &'static str, value: &str, width: usize) -> HeatgridResult<()> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(HeatgridError::FieldTooLong {
            field,
            limit: width,
            actual: bytes.len(),
        });
    }
    buf.put_slice(bytes);
    buf.put_bytes(0, width - bytes.len());
    Ok(())
}

fn get_fixed(field: &[u8]) -> HeatgridResult<String> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .map(str::to_owned)
        .map_err(|e| HeatgridError::InvalidWireFormat(format!("address field: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_layout() {
        let record = AddressRecord::new("AA:BB:CC:DD:EE:FF", "192.168.100.200");
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len(), ADDRESS_RECORD_SIZE);
        assert_eq!(&bytes[..17], b"AA:BB:CC:DD:EE:FF");
        assert_eq!(bytes[17], 0);
        assert_eq!(&bytes[18..33], b"192.168.100.200");
        assert_eq!(AddressRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_field_overflow_is_an_error() {
        let record = AddressRecord::new("AA:BB:CC:DD:EE:FF:00", "10.0.0.1");
        assert!(matches!(
            record.encode(),
            Err(HeatgridError::FieldTooLong { field: "mac", limit: 18, actual: 20 })
        ));
        let record = AddressRecord::new("", "1234:5678:9abc:def0");
        assert!(matches!(
            record.encode(),
            Err(HeatgridError::FieldTooLong { field: "ip", .. })
        ));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(AddressRecord::decode(&[0u8; 10]).is_err());
        assert_eq!(
            AddressRecord::decode(&[0u8; ADDRESS_RECORD_SIZE]).unwrap(),
            AddressRecord::default()
        );
    }
}
