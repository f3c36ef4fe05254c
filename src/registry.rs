//! The connection table: every logical UDP or ICMP endpoint the stack currently
//! multiplexes traffic to, plus the per-connection IGMP membership timer state.

use alloc::boxed::Box;
use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::addr::{Ipv4Addr, MacAddr};

/// ICMP or UDP: the two protocols a connection can speak (TCP is out of scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Icmp,
    Udp,
}

/// A receive callback. Boxed rather than a bare function pointer so callers can
/// capture state, mirroring the original's `(ctx, handler)` pair without exposing a
/// raw context pointer at this crate's API boundary.
pub type Handler = Box<dyn FnMut(&[u8])>;

/// A stable handle to a registered connection, valid until
/// [`crate::stack::Stack::unregister`] is called for it. Unlike a raw index, it
/// survives other connections being unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

/// One logical endpoint: a pre-templated transmit buffer plus the routing and
/// membership-timer state the receive path and poll loop consult.
pub struct NetConnection {
    pub id: ConnectionId,
    pub protocol: Protocol,
    /// Pre-templated Ethernet+IP(+UDP) headers followed by payload space, `PKTSIZE`
    /// bytes, refreshed on every `ip_send`.
    pub packet: Vec<u8>,
    pub handler: Handler,
    pub daddr: Ipv4Addr,
    pub dest_mac: MacAddr,
    /// Ephemeral local port; meaningful for UDP only.
    pub local_port: u16,
    /// Remote port; meaningful for UDP only.
    pub remote_port: u16,
    /// Absolute nanosecond deadline for the next IGMP membership report, or `None`
    /// when disarmed. Always `None` for non-multicast destinations.
    pub igmp_report_deadline: Option<u64>,
}

impl NetConnection {
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.daddr.is_multicast()
    }
}

/// The connection table. An ordered, append-only-except-`remove` list: the original
/// scans linearly, and this crate's working set is always small (a handful of
/// logical endpoints), so a `SmallVec` inline buffer avoids heap churn for the
/// common case while still spilling to the heap if a host opens many connections.
#[derive(Default)]
pub struct Registry {
    connections: SmallVec<[NetConnection; 8]>,
    next_id: u64,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Registry::default()
    }

    /// Builds a fresh connection id and appends `build(id)`'s result, so callers can
    /// stamp the id into the connection they construct without a separate mutation
    /// pass.
    pub fn insert(&mut self, build: impl FnOnce(ConnectionId) -> NetConnection) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.connections.push(build(id));
        id
    }

    /// Removes the connection with the given id, matching the original's "any
    /// registered connection may be torn down at any time" contract. Order of the
    /// remaining connections is not preserved.
    pub fn remove(&mut self, id: ConnectionId) -> Option<NetConnection> {
        let pos = self.connections.iter().position(|c| c.id == id)?;
        Some(self.connections.swap_remove(pos))
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut NetConnection> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetConnection> {
        self.connections.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NetConnection> {
        self.connections.iter_mut()
    }

    #[must_use]
    pub fn first_icmp_mut(&mut self) -> Option<&mut NetConnection> {
        self.connections
            .iter_mut()
            .find(|c| c.protocol == Protocol::Icmp)
    }

    pub fn find_udp_mut(&mut self, local_port: u16, daddr: Ipv4Addr) -> Option<&mut NetConnection> {
        self.connections.iter_mut().find(|c| {
            c.protocol == Protocol::Udp
                && c.local_port == local_port
                && (!c.is_multicast() || c.daddr == daddr)
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
