//! Tunnel interface addresses

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::AddressError;

/// The tunnel interface's own addresses, as assigned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceAddresses {
    pub ipv4: Ipv4Addr,
    pub ipv6: Ipv6Addr,
}

impl InterfaceAddresses {
    pub fn new(ipv4: Ipv4Addr, ipv6: Ipv6Addr) -> Self {
        Self { ipv4, ipv6 }
    }

    /// Parse the address strings delivered by the engine
    pub fn parse(ipv4: &str, ipv6: &str) -> Result<Self, AddressError> {
        let v4 = ipv4
            .trim()
            .parse()
            .map_err(|_| AddressError(ipv4.to_string()))?;
        let v6 = ipv6
            .trim()
            .parse()
            .map_err(|_| AddressError(ipv6.to_string()))?;
        Ok(Self::new(v4, v6))
    }
}

impl std::fmt::Display for InterfaceAddresses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.ipv4, self.ipv6)
    }
}
