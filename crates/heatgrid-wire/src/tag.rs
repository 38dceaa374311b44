//! Message tags
//!
//! Tags select the logical channel a message travels on. Receivers match on
//! (source, tag), so each protocol exchange uses its own tag.

use heatgrid_core::{HeatgridError, HeatgridResult};

/// Fabric message tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Worker MAC/IP registration with the correlator
    Address = 0,
    /// Identity handshake between neighbours
    InfoExchange = 1,
    /// Confirmation request to a neighbour
    Request = 2,
    /// Reply carrying the neighbour's current reading
    Reading = 3,
    /// Alert report to the correlator
    Report = 4,
    /// Correlator-to-worker termination signal
    Termination = 5,
    /// Run parameters broadcast before the first tick
    Params = 6,
}

impl Tag {
    pub fn from_byte(b: u8) -> HeatgridResult<Self> {
        match b {
            0 => Ok(Tag::Address),
            1 => Ok(Tag::InfoExchange),
            2 => Ok(Tag::Request),
            3 => Ok(Tag::Reading),
            4 => Ok(Tag::Report),
            5 => Ok(Tag::Termination),
            6 => Ok(Tag::Params),
            _ => Err(HeatgridError::UnknownTag(b)),
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_bytes() {
        for tag in [
            Tag::Address,
            Tag::InfoExchange,
            Tag::Request,
            Tag::Reading,
            Tag::Report,
            Tag::Termination,
            Tag::Params,
        ] {
            assert_eq!(Tag::from_byte(tag.to_byte()).unwrap(), tag);
        }
        assert!(matches!(Tag::from_byte(9), Err(HeatgridError::UnknownTag(9))));
    }
}
