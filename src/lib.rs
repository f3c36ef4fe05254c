//! A hand-rolled, single-threaded, polling-driven Ethernet/ARP/IPv4/ICMP/UDP/IGMPv1
//! network stack for a bootloader-class environment, together with the boot-image
//! orchestrator that selects, loads, and hands off a bootable payload.
//!
//! There is no sockets API, no TCP, and no preemption: the host application drives
//! everything by calling [`Stack::poll`] from its own busy loops. No callback is ever
//! invoked outside of that call.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod addr;
pub mod arp_resolver;
pub mod bootm;
pub mod clock;
pub mod device;
pub mod env;
pub mod error;
pub mod igmp_timer;
pub mod prng;
pub mod registry;
pub mod rx;
pub mod stack;
pub mod wire;

#[cfg(test)]
pub(crate) mod testutil;


pub use addr::{Ipv4Addr, MacAddr};
pub use error::Error;
pub use stack::Stack;

/// Number of receive buffers the driver is expected to keep in flight (`PKTBUFSRX`).
pub const PKTBUFSRX: usize = 4;

/// Size in bytes of every packet buffer, receive or transmit (`PKTSIZE`).
pub const PKTSIZE: usize = 1536;

/// Number of ARP retransmissions before [`arp_resolver`] gives up (`PKT_NUM_RETRIES`).
pub const PKT_NUM_RETRIES: u32 = 5;

/// ARP/connection-send retry interval.
pub const ARP_TIMEOUT_NANOS: u64 = 3_000_000_000;
