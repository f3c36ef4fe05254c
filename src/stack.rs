//! The `Stack`: sole owner of the connection registry, ARP wait slot, and ID/port
//! counters, tying the device driver, clock, and cancellation collaborators
//! together behind a single `&mut self` API. See §4.3–§4.4 and §9's note on
//! confining what the original scattered across file-scope statics.

use alloc::vec::Vec;

use log::{debug, info};

use crate::addr::{Ipv4Addr, MacAddr};
use crate::arp_resolver::ArpResolver;
use crate::clock::{Clock, Interrupt};
use crate::device::EthernetDevice;
use crate::error::Error;
use crate::prng::Prng;
use crate::registry::{ConnectionId, Handler, NetConnection, Protocol, Registry};
use crate::wire::{ethernet, icmp, ipv4, udp};
use crate::{ARP_TIMEOUT_NANOS, PKTSIZE, PKT_NUM_RETRIES};

/// The smallest ephemeral port the original hands out (`net_udp_new_localport`
/// starts counting from here and wraps).
const EPHEMERAL_PORT_BASE: u16 = 1024;

pub struct Stack<D: EthernetDevice, C: Clock, Intr: Interrupt> {
    pub(crate) device: D,
    pub(crate) clock: C,
    pub(crate) interrupt: Intr,
    pub(crate) registry: Registry,
    pub(crate) arp: ArpResolver,
    pub(crate) prng: Prng,
    pub(crate) ip_id: u16,
    local_port: u16,
    /// Reused across every IGMP report emitted by `poll`, per §4.6 (a scratch
    /// buffer rather than a fresh heap allocation each time).
    pub(crate) scratch: heapless::Vec<u8, PKTSIZE>,
}

impl<D: EthernetDevice, C: Clock, Intr: Interrupt> Stack<D, C, Intr> {
    pub fn new(mut device: D, clock: C, interrupt: Intr, rng_seed: [u8; 32]) -> Self {
        device.register_param("nameserver", "");
        device.register_param("domainname", "");
        Stack {
            device,
            clock,
            interrupt,
            registry: Registry::new(),
            arp: ArpResolver::new(),
            prng: Prng::new(rng_seed),
            ip_id: 0,
            local_port: EPHEMERAL_PORT_BASE,
            scratch: heapless::Vec::new(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Allocates a fresh, zeroed `PKTSIZE`-byte transmit buffer. The caller drops it
    /// (or hands it to a connection) when done; there is no explicit free.
    #[must_use]
    pub fn alloc_packet(&self) -> Vec<u8> {
        alloc::vec![0u8; PKTSIZE]
    }

    fn next_local_port(&mut self) -> u16 {
        let port = self.local_port;
        self.local_port = if self.local_port == u16::MAX {
            EPHEMERAL_PORT_BASE
        } else {
            self.local_port + 1
        };
        port
    }

    /// Ensures the device has a usable station address, synthesising and publishing
    /// a random locally-administered one if not. Part of `new_connection`'s
    /// preamble (§4.3 step 1), but also useful to call eagerly at boot.
    pub fn ensure_mac_address(&mut self) {
        if self.device.mac_address().is_invalid() {
            let mac = self.prng.random_mac();
            self.device.set_mac_address(mac);
        }
    }

    /// Synchronous ARP resolution, per §4.2. Busy-loops calling [`Stack::poll`] until
    /// the reply arrives, the interrupt collaborator fires, or the retry budget is
    /// exhausted.
    pub fn arp_request(&mut self, dest_ip: Ipv4Addr) -> Result<MacAddr, Error> {
        let device_ip = self.device.ipv4_address().ok_or(Error::NoNetwork)?;
        let netmask = self.device.netmask();
        let wait_target = if dest_ip.mask(netmask) != device_ip.mask(netmask) {
            match self.device.gateway() {
                Some(gw) if !gw.is_unspecified() => gw,
                _ => dest_ip,
            }
        } else {
            dest_ip
        };

        self.arp.begin(wait_target);

        let mut frame = self.alloc_packet();
        frame.truncate(ethernet::HEADER_LEN + crate::wire::arp::LEN);
        let device_mac = self.device.mac_address();
        ethernet::write_header(&mut frame, MacAddr::BROADCAST, device_mac, ethernet::ETHERTYPE_ARP);
        crate::wire::arp::write(
            &mut frame[ethernet::HEADER_LEN..],
            crate::wire::arp::OP_REQUEST,
            device_mac,
            device_ip,
            MacAddr::ZERO,
            wait_target,
        );

        let start = self.clock.now_nanos();
        let mut retries = 0u32;
        self.device.send(&frame).map_err(|_| Error::NoDevice)?;

        loop {
            self.poll();

            if let Some(mac) = self.arp.result() {
                self.arp.cancel();
                return Ok(mac);
            }

            if self.interrupt.is_interrupted() {
                self.arp.cancel();
                return Err(Error::Interrupted);
            }

            // Each retry's deadline is counted from the fixed `start`, not from
            // whatever the clock happens to read at the moment of the previous
            // retry, so a slow poll loop cannot push later deadlines further out.
            let deadline = start + u64::from(retries + 1) * ARP_TIMEOUT_NANOS;
            if self.clock.now_nanos() >= deadline {
                retries += 1;
                if retries > PKT_NUM_RETRIES {
                    self.arp.cancel();
                    return Err(Error::Timeout);
                }
                info!("T ");
                self.device.send(&frame).map_err(|_| Error::NoDevice)?;
            }
        }
    }

    /// Shared preamble for UDP/ICMP connection construction, per §4.3.
    fn new_connection(&mut self, protocol: Protocol, dest: Ipv4Addr, handler: Handler) -> Result<ConnectionId, Error> {
        self.ensure_mac_address();

        let device_ip = self.device.ipv4_address();
        if device_ip.is_none() && !dest.is_broadcast() && !dest.is_multicast() {
            return Err(Error::NoNetwork);
        }

        let mut deadline = None;
        let dest_mac = if dest.is_broadcast() {
            MacAddr::BROADCAST
        } else if dest.is_multicast() {
            deadline = Some(self.clock.now_nanos());
            dest.multicast_mac()
        } else {
            self.arp_request(dest)?
        };

        let mut packet = self.alloc_packet();
        let src_ip = device_ip.unwrap_or(Ipv4Addr::UNSPECIFIED);
        let device_mac = self.device.mac_address();
        ethernet::write_header(&mut packet, dest_mac, device_mac, ethernet::ETHERTYPE_IP);
        ipv4::write_header(
            &mut packet[ethernet::HEADER_LEN..],
            0,
            ipv4::HEADER_LEN as u16,
            self.next_ip_id(),
            ipv4::FLAGS_DONT_FRAGMENT,
            ipv4::TTL_DEFAULT,
            protocol_number(protocol),
            src_ip,
            dest,
        );

        let id = self.registry.insert(|id| NetConnection {
            id,
            protocol,
            packet,
            handler,
            daddr: dest,
            dest_mac,
            local_port: 0,
            remote_port: 0,
            igmp_report_deadline: deadline,
        });
        Ok(id)
    }

    pub fn udp_new(
        &mut self,
        dest: Ipv4Addr,
        remote_port: u16,
        handler: Handler,
    ) -> Result<ConnectionId, Error> {
        let local_port = self.next_local_port();
        let id = self.new_connection(Protocol::Udp, dest, handler)?;
        if let Some(conn) = self.registry.get_mut(id) {
            conn.local_port = local_port;
            conn.remote_port = remote_port;
            let offset = ethernet::HEADER_LEN + ipv4::HEADER_LEN;
            udp::write_header(&mut conn.packet[offset..], local_port, remote_port, 0);
        }
        Ok(id)
    }

    pub fn icmp_new(&mut self, dest: Ipv4Addr, handler: Handler) -> Result<ConnectionId, Error> {
        self.new_connection(Protocol::Icmp, dest, handler)
    }

    pub fn unregister(&mut self, id: ConnectionId) {
        self.registry.remove(id);
    }

    fn next_ip_id(&mut self) -> u16 {
        let id = self.ip_id;
        self.ip_id = self.ip_id.wrapping_add(1);
        id
    }

    /// Rewrites the source IP from the current device IP, bumps the IP ID counter,
    /// recomputes the checksum, and transmits `14 + 20 + payload_len` bytes. §4.4.
    pub fn ip_send(&mut self, id: ConnectionId, payload_len: usize) -> Result<(), Error> {
        let src_ip = self.device.ipv4_address().unwrap_or(Ipv4Addr::UNSPECIFIED);
        let ip_id = self.next_ip_id();
        let conn = self.registry.get_mut(id).ok_or(Error::NotFound)?;

        let total_len = (ipv4::HEADER_LEN + payload_len) as u16;
        let ip_header = &mut conn.packet[ethernet::HEADER_LEN..ethernet::HEADER_LEN + ipv4::HEADER_LEN];
        let tos = ip_header[1];
        let ttl = ip_header[8];
        let protocol = ip_header[9];
        let dest = conn.daddr;
        ipv4::write_header(ip_header, tos, total_len, ip_id, ipv4::FLAGS_DONT_FRAGMENT, ttl, protocol, src_ip, dest);

        let frame_len = ethernet::HEADER_LEN + ipv4::HEADER_LEN + payload_len;
        self.device.send(&conn.packet[..frame_len]).map_err(|_| Error::NoDevice)
    }

    /// Sets `uh_ulen`/zeroed checksum, then delegates to [`Stack::ip_send`]. §4.4.
    pub fn udp_send(&mut self, id: ConnectionId, len: usize) -> Result<(), Error> {
        if let Some(conn) = self.registry.get_mut(id) {
            let offset = ethernet::HEADER_LEN + ipv4::HEADER_LEN;
            let src_port = conn.local_port;
            let dst_port = conn.remote_port;
            udp::write_header(&mut conn.packet[offset..], src_port, dst_port, len as u16);
        }
        self.ip_send(id, udp::HEADER_LEN + len)
    }

    /// Computes the ICMP checksum over the caller-filled body, then delegates to
    /// [`Stack::ip_send`]. §4.4.
    pub fn icmp_send(&mut self, id: ConnectionId, icmp_type: u8, code: u8, identifier: u16, sequence: u16, len: usize) -> Result<(), Error> {
        if let Some(conn) = self.registry.get_mut(id) {
            let offset = ethernet::HEADER_LEN + ipv4::HEADER_LEN;
            icmp::write_header_and_checksum(&mut conn.packet[offset..], icmp_type, code, identifier, sequence, icmp::HEADER_LEN + len);
        }
        self.ip_send(id, icmp::HEADER_LEN + len)
    }

    /// Advances IGMP timers, then drains every frame the device currently has
    /// pending, in order. §4.6/§5.
    pub fn poll(&mut self) {
        self.run_igmp_timers();

        while self.device.has_packet() {
            if let Some(frame) = self.device.receive_rx_buffer() {
                self.receive(&frame);
            } else {
                break;
            }
        }
    }

    fn run_igmp_timers(&mut self) {
        let now = self.clock.now_nanos();
        let due = crate::igmp_timer::due_connection_ids(&self.registry, now);
        for id in due {
            self.emit_igmp_report(id);
        }
    }

    fn emit_igmp_report(&mut self, id: ConnectionId) {
        let (group, dest_mac) = {
            let Some(conn) = self.registry.get_mut(id) else {
                return;
            };
            conn.igmp_report_deadline = None;
            (conn.daddr, conn.dest_mac)
        };

        let src_mac = self.device.mac_address();
        let src_ip = self.device.ipv4_address().unwrap_or(Ipv4Addr::UNSPECIFIED);

        self.scratch.clear();
        let _ = self.scratch.resize(ethernet::HEADER_LEN + ipv4::HEADER_LEN + crate::wire::igmp::LEN, 0);

        let buf = self.scratch.as_mut_slice();
        ethernet::write_header(buf, dest_mac, src_mac, ethernet::ETHERTYPE_IP);
        ipv4::write_header(
            &mut buf[ethernet::HEADER_LEN..],
            0,
            (ipv4::HEADER_LEN + crate::wire::igmp::LEN) as u16,
            0,
            ipv4::FLAGS_DONT_FRAGMENT,
            ipv4::TTL_IGMP,
            ipv4::PROTO_IGMP,
            src_ip,
            group,
        );
        crate::wire::igmp::write(
            &mut buf[ethernet::HEADER_LEN + ipv4::HEADER_LEN..],
            crate::wire::igmp::TYPE_HOST_MEMBERSHIP_REPORT,
            group,
        );

        let frame = self.scratch.clone();
        if let Err(err) = self.device.send(&frame) {
            debug!("igmp report send failed: {err:?}");
        }
    }
}

#[must_use]
fn protocol_number(protocol: Protocol) -> u8 {
    match protocol {
        Protocol::Icmp => ipv4::PROTO_ICMP,
        Protocol::Udp => ipv4::PROTO_UDP,
    }
}
