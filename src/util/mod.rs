use std::net::{IpAddr, Ipv4Addr};

use systemstat::{Platform, System};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// `info` level. Calling this twice is harmless.
pub fn init_log() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Pick an IPv4 address that remote peers can use to reach this host.
///
/// Iterates over all network interfaces provided by `systemstat`, skipping any
/// loopback, link-local or broadcast addresses. Returns `None` if the host
/// exposes no such address or the interfaces cannot be listed.
pub fn select_host_address() -> Option<IpAddr> {
    let system = System::new();
    let networks = system.networks().ok()?;

    networks
        .values()
        .flat_map(|net| net.addrs.iter())
        .find_map(|n| match n.addr {
            systemstat::IpAddr::V4(v) if is_routable(v) => Some(IpAddr::V4(v)),
            _ => None,
        })
}

fn is_routable(v: Ipv4Addr) -> bool {
    !v.is_loopback() && !v.is_link_local() && !v.is_broadcast() && !v.is_unspecified()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_and_link_local_are_not_routable() {
        assert!(!is_routable(Ipv4Addr::LOCALHOST));
        assert!(!is_routable(Ipv4Addr::new(169, 254, 1, 1)));
        assert!(!is_routable(Ipv4Addr::BROADCAST));
        assert!(!is_routable(Ipv4Addr::UNSPECIFIED));
        assert!(is_routable(Ipv4Addr::new(192, 168, 1, 20)));
    }
}
