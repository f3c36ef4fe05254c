//! Hand-rolled wire-format codecs for the protocols this stack speaks. Every codec
//! here is a thin, allocation-free view over a byte slice; there is no generic
//! packet-builder abstraction because the set of frame shapes is small and fixed.

pub mod arp;
pub mod checksum;
pub mod ethernet;
pub mod icmp;
pub mod igmp;
pub mod ipv4;
pub mod udp;
