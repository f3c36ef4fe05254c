//! The driver-facing contract the stack is built on, generalising the teacher's
//! `NetworkInterface` trait (get/send-buffer, polling) to the address- and
//! parameter-aware surface this stack's synchronous model needs.

use alloc::vec::Vec;

use crate::addr::{Ipv4Addr, MacAddr};
use crate::error::Error;

/// Everything the stack needs from a concrete link-layer driver.
///
/// Implementors own the actual DMA buffer pool; this crate only ever sees frames as
/// borrowed slices passed into [`crate::stack::Stack::receive`].
pub trait EthernetDevice {
    /// The device's current station address. All-zero or broadcast-shaped means
    /// "not yet assigned" (the stack treats that as a signal to synthesise one).
    fn mac_address(&self) -> MacAddr;

    /// Publishes a station address back to the device (and, typically, to its
    /// `ethaddr` parameter).
    fn set_mac_address(&mut self, mac: MacAddr);

    fn ipv4_address(&self) -> Option<Ipv4Addr>;

    fn netmask(&self) -> Ipv4Addr;

    fn gateway(&self) -> Option<Ipv4Addr>;

    /// The address of a configured boot/TFTP server, if any.
    fn server_ip(&self) -> Option<Ipv4Addr>;

    /// Transmits one complete Ethernet frame, including its 14-byte header.
    fn send(&mut self, frame: &[u8]) -> Result<(), Error>;

    /// Called once per inbound frame, before dispatch, so a driver can flash an RX
    /// LED or bump a counter; never fails.
    fn indicate_rx(&mut self) {}

    /// Registers a named device parameter with an empty-string default (`nameserver`,
    /// `domainname`). Drivers that do not expose a parameter subsystem may no-op.
    fn register_param(&mut self, _name: &str, _default: &str) {}

    /// True while a received frame is waiting to be drained, mirroring the teacher's
    /// `NetworkInterface::has_packet`.
    fn has_packet(&self) -> bool;

    /// Takes ownership of the next pending received frame, mirroring the teacher's
    /// `NetworkInterface::receive_rx_buffer`. `Stack::poll` drains every frame
    /// available at the start of the call before returning.
    fn receive_rx_buffer(&mut self) -> Option<Vec<u8>>;
}
