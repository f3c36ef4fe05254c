//! IGMPv1-ish membership message codec: an 8-byte `{type, unused, checksum, group}`
//! record, per §6.

use crate::addr::Ipv4Addr;
use crate::error::Error;
use crate::wire::checksum;

pub const LEN: usize = 8;

pub const TYPE_HOST_MEMBERSHIP_QUERY: u8 = 0x11;
pub const TYPE_HOST_MEMBERSHIP_REPORT: u8 = 0x12;

/// True for any message type this handler is willing to look at further; the
/// original rejects anything outside the v1/v2-ish `0x1x` family outright.
#[must_use]
pub fn is_known_family(message_type: u8) -> bool {
    message_type >> 4 == 0x1
}

pub struct IgmpMessage<'a> {
    buf: &'a [u8],
}

impl<'a> IgmpMessage<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, Error> {
        if buf.len() < LEN {
            return Err(Error::InvalidArgument);
        }
        Ok(IgmpMessage { buf })
    }

    #[must_use]
    pub fn message_type(&self) -> u8 {
        self.buf[0]
    }

    #[must_use]
    pub fn unused(&self) -> u8 {
        self.buf[1]
    }

    #[must_use]
    pub fn checksum_field(&self) -> u16 {
        u16::from_be_bytes([self.buf[2], self.buf[3]])
    }

    #[must_use]
    pub fn group_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from_be_bytes(self.buf[4..8].try_into().unwrap())
    }

    #[must_use]
    pub fn checksum_ok(&self) -> bool {
        checksum::verify(&self.buf[0..LEN])
    }
}

/// Writes an 8-byte IGMP message with the checksum computed over the fixed record.
pub fn write(buf: &mut [u8], message_type: u8, group: Ipv4Addr) {
    buf[0] = message_type;
    buf[1] = 0;
    buf[2..4].copy_from_slice(&[0, 0]);
    buf[4..8].copy_from_slice(&group.octets());

    let check = checksum::compute(&buf[0..LEN]);
    buf[2..4].copy_from_slice(&check.to_be_bytes());
}
