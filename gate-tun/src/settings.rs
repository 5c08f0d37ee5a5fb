//! Tunnel network settings
//!
//! One [`TunnelNetworkSettings`] value describes everything the OS tunnel
//! provider needs to configure the virtual interface: interface addresses,
//! included routes, DNS and MTU. It is applied atomically, as a whole.
//!
//! ```text
//! TunnelNetworkSettings
//!   ├── tunnel_remote_address
//!   ├── ipv4: addresses + subnet masks, included routes
//!   ├── ipv6: addresses + prefix lengths, included routes
//!   ├── dns:  servers + match domains
//!   └── mtu
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::route::{Ipv4Route, Ipv6Route, Route, IPV4_HOST_MASK, IPV6_HOST_PREFIX};
use crate::DEFAULT_MTU;

/// Network settings for the tunnel interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelNetworkSettings {
    /// Remote tunnel address reported to the OS
    pub tunnel_remote_address: IpAddr,
    /// IPv4 settings
    pub ipv4: Ipv4Settings,
    /// IPv6 settings
    pub ipv6: Ipv6Settings,
    /// DNS settings
    pub dns: DnsSettings,
    /// MTU
    pub mtu: u16,
}

impl TunnelNetworkSettings {
    /// Create empty settings for the given remote address
    pub fn new(tunnel_remote_address: impl Into<IpAddr>) -> Self {
        Self {
            tunnel_remote_address: tunnel_remote_address.into(),
            ipv4: Ipv4Settings::default(),
            ipv6: Ipv6Settings::default(),
            dns: DnsSettings::default(),
            mtu: DEFAULT_MTU,
        }
    }

    /// Set IPv4 settings
    pub fn with_ipv4(mut self, ipv4: Ipv4Settings) -> Self {
        self.ipv4 = ipv4;
        self
    }

    /// Set IPv6 settings
    pub fn with_ipv6(mut self, ipv6: Ipv6Settings) -> Self {
        self.ipv6 = ipv6;
        self
    }

    /// Set DNS settings
    pub fn with_dns(mut self, dns: DnsSettings) -> Self {
        self.dns = dns;
        self
    }

    /// Set MTU
    pub fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// Include a route of either family
    pub fn include_route(&mut self, route: Route) {
        match route {
            Route::V4(route) => self.ipv4.included_routes.push(route),
            Route::V6(route) => self.ipv6.included_routes.push(route),
        }
    }

    /// All included routes, IPv4 first
    pub fn routes(&self) -> impl Iterator<Item = Route> + '_ {
        let v4 = self.ipv4.included_routes.iter().cloned().map(Route::V4);
        let v6 = self.ipv6.included_routes.iter().cloned().map(Route::V6);
        v4.chain(v6)
    }
}

/// IPv4 interface configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Settings {
    /// Local IPv4 addresses
    pub addresses: Vec<Ipv4Addr>,
    /// Subnet masks (one per address)
    pub subnet_masks: Vec<Ipv4Addr>,
    /// Routes to send through the tunnel
    pub included_routes: Vec<Ipv4Route>,
}

impl Ipv4Settings {
    /// Add an interface address with a host mask
    pub fn with_host_address(mut self, address: Ipv4Addr) -> Self {
        self.addresses.push(address);
        self.subnet_masks.push(IPV4_HOST_MASK);
        self
    }

    /// Add a route
    pub fn with_route(mut self, route: Ipv4Route) -> Self {
        self.included_routes.push(route);
        self
    }
}

/// IPv6 interface configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6Settings {
    /// Local IPv6 addresses
    pub addresses: Vec<Ipv6Addr>,
    /// Network prefix lengths (one per address)
    pub prefix_lengths: Vec<u8>,
    /// Routes to send through the tunnel
    pub included_routes: Vec<Ipv6Route>,
}

impl Ipv6Settings {
    /// Add an interface address with a host prefix
    pub fn with_host_address(mut self, address: Ipv6Addr) -> Self {
        self.addresses.push(address);
        self.prefix_lengths.push(IPV6_HOST_PREFIX);
        self
    }

    /// Add a route
    pub fn with_route(mut self, route: Ipv6Route) -> Self {
        self.included_routes.push(route);
        self
    }
}

/// DNS configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSettings {
    /// DNS servers
    pub servers: Vec<IpAddr>,
    /// Domains whose queries go to `servers`; `""` matches every query
    pub match_domains: Vec<String>,
}

impl DnsSettings {
    /// Send every DNS query to the given servers
    pub fn match_all(servers: Vec<IpAddr>) -> Self {
        Self {
            servers,
            match_domains: vec![String::new()],
        }
    }

    /// Check if every query is matched
    pub fn matches_all(&self) -> bool {
        self.match_domains.iter().any(|d| d.is_empty())
    }
}
