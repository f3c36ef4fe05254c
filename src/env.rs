//! The environment-variable integration, generalising the original's global
//! key/value store (`getenv`/`setenv`) into a host-implemented [`EnvStore`] trait,
//! with DNS fallback for names that don't parse as a literal address.

use alloc::string::{String, ToString};

use crate::addr::Ipv4Addr;
use crate::error::Error;

/// A host-provided key/value store standing in for the original's environment
/// variable subsystem.
pub trait EnvStore {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str);
}

/// Resolves a hostname to an IPv4 address, consulted when an environment value does
/// not parse as a literal dotted-quad.
pub trait DnsResolver {
    fn resolve(&mut self, hostname: &str) -> Result<Ipv4Addr, Error>;
}

/// Reads a textual IPv4 address out of `store`, falling back to resolving it as a
/// hostname through `dns` if it doesn't parse literally. Returns
/// [`Ipv4Addr::UNSPECIFIED`] if the variable is unset, matching the original's
/// "missing variable reads as `0.0.0.0`" convention.
pub fn getenv_ip(store: &dyn EnvStore, dns: &mut dyn DnsResolver, name: &str) -> Ipv4Addr {
    let Some(value) = store.get(name) else {
        return Ipv4Addr::UNSPECIFIED;
    };
    value
        .parse()
        .unwrap_or_else(|_| dns.resolve(&value).unwrap_or(Ipv4Addr::UNSPECIFIED))
}

/// Writes the canonical textual form of `ip` to `name`.
pub fn setenv_ip(store: &mut dyn EnvStore, name: &str, ip: Ipv4Addr) {
    store.set(name, &ip.to_string());
}
