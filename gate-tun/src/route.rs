//! Included routes for tunnel network settings
//!
//! Routes here are the OS tunnel-provider kind: a destination plus a mask or
//! prefix length, always pointing into the tunnel. There is no gateway or
//! metric, the provider owns the interface.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};

/// Subnet mask of a single IPv4 host
pub const IPV4_HOST_MASK: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Prefix length of a single IPv6 host
pub const IPV6_HOST_PREFIX: u8 = 128;

/// An IPv4 route included in the tunnel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Route {
    /// Destination network address
    pub destination: Ipv4Addr,
    /// Subnet mask
    pub subnet_mask: Ipv4Addr,
}

impl Ipv4Route {
    /// Route to a single host (`/32`)
    pub fn host(destination: Ipv4Addr) -> Self {
        Self {
            destination,
            subnet_mask: IPV4_HOST_MASK,
        }
    }

    /// Route covering a whole network
    ///
    /// The destination is the masked network address, so `10.0.0.7/24`
    /// becomes `10.0.0.0` / `255.255.255.0`.
    pub fn from_net(net: Ipv4Net) -> Self {
        Self {
            destination: net.network(),
            subnet_mask: net.netmask(),
        }
    }

    /// Prefix length of the subnet mask
    pub fn prefix_len(&self) -> u8 {
        u32::from(self.subnet_mask).count_ones() as u8
    }

    /// Check if this route covers a single host
    pub fn is_host(&self) -> bool {
        self.subnet_mask == IPV4_HOST_MASK
    }
}

/// An IPv6 route included in the tunnel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv6Route {
    /// Destination network address
    pub destination: Ipv6Addr,
    /// Network prefix length
    pub prefix_length: u8,
}

impl Ipv6Route {
    /// Route to a single host (`/128`)
    pub fn host(destination: Ipv6Addr) -> Self {
        Self {
            destination,
            prefix_length: IPV6_HOST_PREFIX,
        }
    }

    /// Route covering a whole network, using the masked network address
    pub fn from_net(net: Ipv6Net) -> Self {
        Self {
            destination: net.network(),
            prefix_length: net.prefix_len(),
        }
    }

    /// Check if this route covers a single host
    pub fn is_host(&self) -> bool {
        self.prefix_length == IPV6_HOST_PREFIX
    }
}

/// A route of either address family
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    V4(Ipv4Route),
    V6(Ipv6Route),
}

impl Route {
    /// Route to a single host
    pub fn host(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(addr) => Route::V4(Ipv4Route::host(addr)),
            IpAddr::V6(addr) => Route::V6(Ipv6Route::host(addr)),
        }
    }

    /// Exactly one route covering `net`
    pub fn from_net(net: IpNet) -> Self {
        match net {
            IpNet::V4(net) => Route::V4(Ipv4Route::from_net(net)),
            IpNet::V6(net) => Route::V6(Ipv6Route::from_net(net)),
        }
    }

    /// Check if this is an IPv4 route
    pub fn is_ipv4(&self) -> bool {
        matches!(self, Route::V4(_))
    }

    /// Check if this is an IPv6 route
    pub fn is_ipv6(&self) -> bool {
        matches!(self, Route::V6(_))
    }
}

impl From<IpNet> for Route {
    fn from(net: IpNet) -> Self {
        Route::from_net(net)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::V4(route) => write!(f, "{}/{}", route.destination, route.prefix_len()),
            Route::V6(route) => write!(f, "{}/{}", route.destination, route.prefix_length),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_host_route() {
        let route = Ipv4Route::host(Ipv4Addr::new(100, 64, 0, 1));
        assert_eq!(route.subnet_mask, Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(route.prefix_len(), 32);
        assert!(route.is_host());
    }

    #[test]
    fn test_ipv4_route_is_masked() {
        let net: Ipv4Net = "10.0.0.7/24".parse().unwrap();
        let route = Ipv4Route::from_net(net);
        assert_eq!(route.destination, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(route.subnet_mask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(route.prefix_len(), 24);

        let route = Ipv4Route::from_net("192.168.1.50/16".parse().unwrap());
        assert_eq!(route.destination, Ipv4Addr::new(192, 168, 0, 0));
        assert_eq!(route.subnet_mask, Ipv4Addr::new(255, 255, 0, 0));
    }

    #[test]
    fn test_ipv6_route_is_masked() {
        let net: Ipv6Net = "fd00:2021:1111::1:2/64".parse().unwrap();
        let route = Ipv6Route::from_net(net);
        assert_eq!(route.destination, "fd00:2021:1111::".parse::<Ipv6Addr>().unwrap());
        assert_eq!(route.prefix_length, 64);
        assert!(!route.is_host());
    }

    #[test]
    fn test_route_display() {
        let route = Route::from_net("10.0.0.0/24".parse().unwrap());
        assert!(route.is_ipv4());
        assert_eq!(route.to_string(), "10.0.0.0/24");

        let route = Route::host("fd00::2".parse().unwrap());
        assert!(route.is_ipv6());
        assert_eq!(route.to_string(), "fd00::2/128");
    }
}
