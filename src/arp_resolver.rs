//! The ARP wait slot: a process-wide singleton tracking at most one in-flight
//! resolution, per §4.2. The retry/timeout loop that drives it lives in
//! [`crate::stack::Stack::arp_request`], since it needs the device and clock
//! collaborators; this module only owns the slot itself and the reply-matching rule.

use crate::addr::{Ipv4Addr, MacAddr};

/// An in-flight ARP resolution: the IP being resolved and, once a matching reply
/// has been observed, its MAC.
#[derive(Debug, Clone, Copy)]
struct ArpWait {
    target: Ipv4Addr,
    resolved: Option<MacAddr>,
}

/// Holds the single outstanding ARP resolution, if any. Idle when empty.
#[derive(Default)]
pub struct ArpResolver {
    wait: Option<ArpWait>,
}

impl ArpResolver {
    #[must_use]
    pub fn new() -> Self {
        ArpResolver::default()
    }

    /// Publishes a new wait target, discarding any previous (already-timed-out or
    /// abandoned) wait. Only one resolution may be in flight at a time.
    pub fn begin(&mut self, target: Ipv4Addr) {
        self.wait = Some(ArpWait {
            target,
            resolved: None,
        });
    }

    pub fn cancel(&mut self) {
        self.wait = None;
    }

    /// Called from the receive path on every ARP reply. Copies `sender_mac` into the
    /// wait slot iff `sender_ip` matches the outstanding target; returns whether it
    /// matched.
    pub fn observe_reply(&mut self, sender_ip: Ipv4Addr, sender_mac: MacAddr) -> bool {
        match &mut self.wait {
            Some(wait) if wait.target == sender_ip => {
                wait.resolved = Some(sender_mac);
                true
            }
            _ => false,
        }
    }

    /// The resolved MAC, if the current wait has been satisfied. Does not clear the
    /// slot; the caller does that via [`ArpResolver::cancel`] once it has consumed
    /// the result.
    #[must_use]
    pub fn result(&self) -> Option<MacAddr> {
        self.wait.and_then(|w| w.resolved)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.wait.is_none()
    }
}
