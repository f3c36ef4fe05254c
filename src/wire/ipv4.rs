//! IPv4 header codec. Options are never accepted on receive and never emitted on
//! transmit (`IHL` is always 5).

use bit_field::BitField;

use crate::addr::Ipv4Addr;
use crate::error::Error;
use crate::wire::checksum;

pub const HEADER_LEN: usize = 20;

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_IGMP: u8 = 2;
pub const PROTO_UDP: u8 = 17;

/// `0x4000`: the don't-fragment bit set, no offset.
pub const FLAGS_DONT_FRAGMENT: u16 = 0x4000;

pub const TTL_DEFAULT: u8 = 255;
pub const TTL_IGMP: u8 = 1;

/// A read-only view over an IPv4 header.
pub struct Ipv4Packet<'a> {
    buf: &'a [u8],
}

impl<'a> Ipv4Packet<'a> {
    /// Validates length, version, and IHL; does not itself verify the checksum
    /// (callers that need that call [`checksum::verify`] on the raw header bytes).
    pub fn new(buf: &'a [u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::InvalidArgument);
        }
        let pkt = Ipv4Packet { buf };
        if pkt.version() != 4 || pkt.ihl() != 5 {
            return Err(Error::InvalidArgument);
        }
        Ok(pkt)
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.buf[0].get_bits(4..8)
    }

    #[must_use]
    pub fn ihl(&self) -> u8 {
        self.buf[0].get_bits(0..4)
    }

    #[must_use]
    pub fn tos(&self) -> u8 {
        self.buf[1]
    }

    #[must_use]
    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes([self.buf[2], self.buf[3]])
    }

    #[must_use]
    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.buf[4], self.buf[5]])
    }

    #[must_use]
    pub fn frag_off(&self) -> u16 {
        u16::from_be_bytes([self.buf[6], self.buf[7]])
    }

    /// True when the packet carries a nonzero fragment offset (the low 13 bits of
    /// `frag_off`); this stack never reassembles, so such packets are dropped on
    /// receive.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.frag_off().get_bits(0..13) != 0
    }

    #[must_use]
    pub fn ttl(&self) -> u8 {
        self.buf[8]
    }

    #[must_use]
    pub fn protocol(&self) -> u8 {
        self.buf[9]
    }

    #[must_use]
    pub fn checksum_field(&self) -> u16 {
        u16::from_be_bytes([self.buf[10], self.buf[11]])
    }

    #[must_use]
    pub fn src(&self) -> Ipv4Addr {
        Ipv4Addr::from_be_bytes(self.buf[12..16].try_into().unwrap())
    }

    #[must_use]
    pub fn dst(&self) -> Ipv4Addr {
        Ipv4Addr::from_be_bytes(self.buf[16..20].try_into().unwrap())
    }

    #[must_use]
    pub fn header_bytes(&self) -> &'a [u8] {
        &self.buf[0..HEADER_LEN]
    }

    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        &self.buf[HEADER_LEN..]
    }

    #[must_use]
    pub fn checksum_ok(&self) -> bool {
        checksum::verify(self.header_bytes())
    }
}

/// Writes a fixed, option-free IPv4 header into the front of `buf` and returns the
/// checksum field written (already complemented). `buf` must be at least
/// [`HEADER_LEN`] bytes; the checksum field is zeroed before the sum is taken.
#[allow(clippy::too_many_arguments)]
pub fn write_header(
    buf: &mut [u8],
    tos: u8,
    total_len: u16,
    id: u16,
    frag_off: u16,
    ttl: u8,
    protocol: u8,
    src: Ipv4Addr,
    dst: Ipv4Addr,
) -> u16 {
    buf[0] = 0x45;
    buf[1] = tos;
    buf[2..4].copy_from_slice(&total_len.to_be_bytes());
    buf[4..6].copy_from_slice(&id.to_be_bytes());
    buf[6..8].copy_from_slice(&frag_off.to_be_bytes());
    buf[8] = ttl;
    buf[9] = protocol;
    buf[10..12].copy_from_slice(&[0, 0]);
    buf[12..16].copy_from_slice(&src.octets());
    buf[16..20].copy_from_slice(&dst.octets());

    let check = checksum::compute(&buf[0..HEADER_LEN]);
    buf[10..12].copy_from_slice(&check.to_be_bytes());
    check
}
