//! Resources delivered by the tunnel engine
//!
//! A resource is a named destination that must be reachable through the
//! tunnel. The engine delivers the full list as a JSON array on every
//! change; each update replaces the previous list as a whole.
//!
//! # Wire Format
//!
//! ```json
//! [
//!   { "type": "dns", "name": "PostHog", "address": "app.posthog.com",
//!     "ipv4": "100.64.0.1", "ipv6": "fd00:2021:1111::1" },
//!   { "type": "cidr", "name": "AWS SJC VPC1", "address": "10.0.0.0/24" }
//! ]
//! ```
//!
//! `dns` entries must carry both `ipv4` and `ipv6`; an empty string means the
//! engine has no address of that family for the resource. `cidr` entries
//! carry a CIDR literal in `address`. Any unknown `type` or missing field
//! fails the whole list.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use gate_tun::Route;
use ipnet::IpNet;
use serde::{Deserialize, Deserializer};

use crate::error::ResourceError;

/// A routable destination
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ResourceDescription")]
pub struct Resource {
    /// Display name
    pub name: String,
    /// Where the resource lives
    pub location: ResourceLocation,
}

/// How a resource is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocation {
    /// A domain the engine resolved to tunnel-side addresses
    Dns {
        domain: String,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    },
    /// An address range
    Cidr { address_range: IpNet },
}

impl Resource {
    /// Create a DNS-backed resource
    pub fn dns(
        name: impl Into<String>,
        domain: impl Into<String>,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Self {
        Self {
            name: name.into(),
            location: ResourceLocation::Dns {
                domain: domain.into(),
                ipv4,
                ipv6,
            },
        }
    }

    /// Create a CIDR-backed resource
    pub fn cidr(name: impl Into<String>, address_range: IpNet) -> Self {
        Self {
            name: name.into(),
            location: ResourceLocation::Cidr { address_range },
        }
    }

    /// Routes needed to reach this resource through the tunnel
    ///
    /// DNS resources get one host route per resolved address; CIDR resources
    /// get exactly one route covering the masked range.
    pub fn routes(&self) -> Vec<Route> {
        match &self.location {
            ResourceLocation::Dns { ipv4, ipv6, .. } => {
                let v4 = ipv4.map(|addr| Route::host(addr.into()));
                let v6 = ipv6.map(|addr| Route::host(addr.into()));
                v4.into_iter().chain(v6).collect()
            }
            ResourceLocation::Cidr { address_range } => vec![Route::from_net(*address_range)],
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            ResourceLocation::Dns { domain, .. } => write!(f, "{} (dns {})", self.name, domain),
            ResourceLocation::Cidr { address_range } => {
                write!(f, "{} (cidr {})", self.name, address_range)
            }
        }
    }
}

/// Parse a resource list as delivered by the engine
///
/// Either every entry parses or the whole list is rejected.
pub fn parse_resources(json: &[u8]) -> Result<Vec<Resource>, ResourceError> {
    Ok(serde_json::from_slice(json)?)
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ResourceDescription {
    Dns {
        name: String,
        address: String,
        #[serde(deserialize_with = "empty_as_none")]
        ipv4: Option<Ipv4Addr>,
        #[serde(deserialize_with = "empty_as_none")]
        ipv6: Option<Ipv6Addr>,
    },
    Cidr {
        name: String,
        address: IpNet,
    },
}

impl From<ResourceDescription> for Resource {
    fn from(description: ResourceDescription) -> Self {
        match description {
            ResourceDescription::Dns {
                name,
                address,
                ipv4,
                ipv6,
            } => Resource::dns(name, address, ipv4, ipv6),
            ResourceDescription::Cidr { name, address } => Resource::cidr(name, address),
        }
    }
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("invalid address `{}`", value)))
}
