//! Per-connection IGMPv1 membership-report scheduling: arming on query, suppressing
//! on a peer's report, and the due-check consulted by `Stack::poll`. See §4.6.

use alloc::vec::Vec;

use crate::addr::Ipv4Addr;
use crate::prng::Prng;
use crate::registry::{ConnectionId, Registry};

/// Upper bound, in whole milliseconds, of the randomised defend delay (`10_000` per
/// the original's `uniform_random(0, 10000)` call before an IGMPv1 report).
const MAX_DELAY_MS: u32 = 10_000;

/// Arms `igmp_report_deadline` on every multicast connection that does not already
/// have one pending, per a received `HOST_MEMBERSHIP_QUERY`.
pub fn schedule_on_query(registry: &mut Registry, now_nanos: u64, prng: &mut Prng) {
    for conn in registry.iter_mut() {
        if conn.is_multicast() && conn.igmp_report_deadline.is_none() {
            let delay_ms = u64::from(prng.uniform_range(MAX_DELAY_MS));
            conn.igmp_report_deadline = Some(now_nanos + delay_ms * 1_000_000);
        }
    }
}

/// Clears the pending deadline on every connection whose group matches an observed
/// `HOST_MEMBERSHIP_REPORT` from another host (IGMP defend/suppress).
pub fn suppress_on_report(registry: &mut Registry, group: Ipv4Addr) {
    for conn in registry.iter_mut() {
        if conn.daddr == group {
            conn.igmp_report_deadline = None;
        }
    }
}

/// Ids, in registry order, of connections whose deadline has elapsed at `now`.
/// `Stack::poll` clears each returned connection's deadline and emits its report;
/// this function only decides *which* are due, since emitting requires the device
/// and scratch buffer that live on `Stack`. Ids are used rather than indices so the
/// result stays valid even if the registry is mutated between computing it and
/// acting on it.
pub fn due_connection_ids(registry: &Registry, now_nanos: u64) -> Vec<ConnectionId> {
    registry
        .iter()
        .filter_map(|conn| match conn.igmp_report_deadline {
            Some(deadline) if deadline <= now_nanos => Some(conn.id),
            _ => None,
        })
        .collect()
}
