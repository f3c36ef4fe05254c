//! The receive demultiplexer: validates inbound frames and routes them to the ARP,
//! ICMP, IGMP, or UDP handler. See §4.5. Implemented as an additional `impl` block
//! on [`Stack`] so the dispatch logic can live in its own file while still being a
//! method on the same type `stack.rs` defines.

use log::debug;

use crate::addr::Ipv4Addr;
use crate::clock::{Clock, Interrupt};
use crate::device::EthernetDevice;
use crate::stack::Stack;
use crate::wire::{arp, ethernet, icmp, igmp, ipv4, udp};

impl<D: EthernetDevice, C: Clock, Intr: Interrupt> Stack<D, C, Intr> {
    /// Called by the device driver with one received frame. Never panics on
    /// malformed input; every validation failure is a silent (`debug!`-logged) drop.
    pub fn receive(&mut self, pkt: &[u8]) {
        self.device.indicate_rx();

        let Ok(eth) = ethernet::EthernetFrame::new(pkt) else {
            debug!("short frame ({} bytes)", pkt.len());
            return;
        };

        match eth.ethertype() {
            ethernet::ETHERTYPE_ARP => self.handle_arp(&eth),
            ethernet::ETHERTYPE_IP => self.handle_ip(&eth),
            other => debug!("ignoring ethertype {other:#06x}"),
        }
    }

    fn handle_arp(&mut self, eth: &ethernet::EthernetFrame<'_>) {
        let Ok(pkt) = arp::ArpPacket::new(eth.payload()) else {
            debug!("truncated arp packet");
            return;
        };
        if !pkt.is_valid_ethernet_ip() {
            debug!("arp packet is not ethernet/ip shaped");
            return;
        }

        let Some(device_ip) = self.device.ipv4_address() else {
            return;
        };
        if pkt.target_ip() != device_ip {
            return;
        }

        match pkt.operation() {
            arp::OP_REQUEST => {
                let device_mac = self.device.mac_address();
                let mut reply = self.alloc_packet();
                reply.truncate(ethernet::HEADER_LEN + arp::LEN);
                ethernet::write_header(&mut reply, pkt.sender_mac(), device_mac, ethernet::ETHERTYPE_ARP);
                arp::write(
                    &mut reply[ethernet::HEADER_LEN..],
                    arp::OP_REPLY,
                    device_mac,
                    device_ip,
                    pkt.sender_mac(),
                    pkt.sender_ip(),
                );
                let _ = self.device.send(&reply);
            }
            arp::OP_REPLY => {
                self.arp.observe_reply(pkt.sender_ip(), pkt.sender_mac());
            }
            _ => debug!("unhandled arp operation {}", pkt.operation()),
        }
    }

    fn handle_ip(&mut self, eth: &ethernet::EthernetFrame<'_>) {
        let payload = eth.payload();
        let Ok(ip) = ipv4::Ipv4Packet::new(payload) else {
            debug!("malformed ipv4 header");
            return;
        };
        if (ip.total_len() as usize) < ipv4::HEADER_LEN || payload.len() < ip.total_len() as usize {
            debug!("ipv4 total_len is inconsistent with the frame");
            return;
        }
        if ip.is_fragment() {
            debug!("dropping ip fragment, no reassembly");
            return;
        }
        if !ip.checksum_ok() {
            debug!("bad ip header checksum");
            return;
        }

        let dst = ip.dst();
        if !self.accepts_destination(dst) {
            return;
        }

        let protocol = ip.protocol();
        let ttl = ip.ttl();
        let src = ip.src();
        let ip_payload_len = ip.total_len() as usize - ipv4::HEADER_LEN;
        let ip_payload = &payload[ipv4::HEADER_LEN..ipv4::HEADER_LEN + ip_payload_len];

        match protocol {
            ipv4::PROTO_ICMP => self.handle_icmp(src, ip_payload),
            ipv4::PROTO_IGMP => self.handle_igmp(dst, ttl, ip_payload),
            ipv4::PROTO_UDP => self.handle_udp(dst, ip_payload),
            other => debug!("ignoring ip protocol {other}"),
        }
    }

    /// Destination-filter policy, §4.5: accept unicast iff it matches the device IP
    /// (or the device has no IP yet, to allow bootstrap); always accept broadcast;
    /// accept multicast only for the all-hosts group or a group some connection has
    /// joined.
    fn accepts_destination(&self, dst: Ipv4Addr) -> bool {
        if dst.is_broadcast() {
            return true;
        }
        if dst.is_multicast() {
            return dst == Ipv4Addr::ALL_HOSTS || self.registry.iter().any(|c| c.daddr == dst);
        }
        match self.device.ipv4_address() {
            Some(device_ip) => dst == device_ip,
            None => true,
        }
    }

    fn handle_icmp(&mut self, _src: Ipv4Addr, payload: &[u8]) {
        let Ok(pkt) = icmp::IcmpPacket::new(payload) else {
            debug!("truncated icmp packet");
            return;
        };
        if !pkt.checksum_ok() {
            debug!("bad icmp checksum");
            return;
        }
        match self.registry.first_icmp_mut() {
            Some(conn) => (conn.handler)(payload),
            None => debug!("no icmp connection registered"),
        }
    }

    fn handle_igmp(&mut self, dst: Ipv4Addr, ttl: u8, payload: &[u8]) {
        let Ok(msg) = igmp::IgmpMessage::new(payload) else {
            debug!("truncated igmp message");
            return;
        };
        if !msg.checksum_ok() {
            debug!("bad igmp checksum");
            return;
        }
        if !igmp::is_known_family(msg.message_type()) {
            debug!("unhandled igmp message type {:#04x}", msg.message_type());
            return;
        }

        match msg.message_type() {
            igmp::TYPE_HOST_MEMBERSHIP_QUERY => {
                if dst != Ipv4Addr::ALL_HOSTS {
                    return;
                }
                let now = self.clock.now_nanos();
                crate::igmp_timer::schedule_on_query(&mut self.registry, now, &mut self.prng);
            }
            igmp::TYPE_HOST_MEMBERSHIP_REPORT => {
                let group = msg.group_addr();
                if dst != group || ttl != ipv4::TTL_IGMP {
                    return;
                }
                crate::igmp_timer::suppress_on_report(&mut self.registry, group);
            }
            other => debug!("unhandled igmp message type {other:#04x}"),
        }
    }

    fn handle_udp(&mut self, dst: Ipv4Addr, payload: &[u8]) {
        let Ok(pkt) = udp::UdpPacket::new(payload) else {
            debug!("truncated udp packet");
            return;
        };
        let dst_port = pkt.dst_port();
        match self.registry.find_udp_mut(dst_port, dst) {
            Some(conn) => (conn.handler)(payload),
            None => debug!("no udp connection on port {dst_port}"),
        }
    }
}
