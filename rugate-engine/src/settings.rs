//! Network settings generation
//!
//! Maps the current interface addresses and resource list to the tunnel
//! settings the OS should apply. Pure: the same inputs always produce the
//! same settings, in the same order.

use std::net::{IpAddr, Ipv4Addr};

use gate_tun::{DnsSettings, Ipv4Settings, Ipv6Settings, TunnelNetworkSettings, DEFAULT_MTU};

use crate::interface::InterfaceAddresses;
use crate::resource::Resource;

/// Address the engine assigns to its in-tunnel DNS proxy
pub const DNS_SENTINEL: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);

/// Remote address reported to the OS; the engine owns the real peers
pub const TUNNEL_REMOTE_ADDRESS: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Build tunnel settings from interface addresses and resources
///
/// - interface addresses get host masks (`/32`, `/128`); none if `addresses`
///   is `None`
/// - every resource contributes its routes, in list order
/// - all DNS goes to [`DNS_SENTINEL`] with a catch-all match domain
/// - MTU is always [`DEFAULT_MTU`]
pub fn generate_network_settings(
    addresses: Option<&InterfaceAddresses>,
    resources: &[Resource],
) -> TunnelNetworkSettings {
    let mut ipv4 = Ipv4Settings::default();
    let mut ipv6 = Ipv6Settings::default();
    if let Some(addresses) = addresses {
        ipv4 = ipv4.with_host_address(addresses.ipv4);
        ipv6 = ipv6.with_host_address(addresses.ipv6);
    }

    let mut settings = TunnelNetworkSettings::new(TUNNEL_REMOTE_ADDRESS)
        .with_ipv4(ipv4)
        .with_ipv6(ipv6)
        .with_dns(DnsSettings::match_all(vec![IpAddr::V4(DNS_SENTINEL)]))
        .with_mtu(DEFAULT_MTU);

    for route in resources.iter().flat_map(Resource::routes) {
        settings.include_route(route);
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_tun::{Ipv4Route, Ipv6Route};
    use std::net::Ipv6Addr;

    fn addresses() -> InterfaceAddresses {
        InterfaceAddresses::new(Ipv4Addr::new(100, 100, 111, 2), "fd00::2".parse().unwrap())
    }

    #[test]
    fn test_interface_addresses_use_host_masks() {
        let settings = generate_network_settings(Some(&addresses()), &[]);

        assert_eq!(settings.ipv4.addresses, vec![Ipv4Addr::new(100, 100, 111, 2)]);
        assert_eq!(settings.ipv4.subnet_masks, vec![Ipv4Addr::new(255, 255, 255, 255)]);
        assert_eq!(settings.ipv6.addresses, vec!["fd00::2".parse::<Ipv6Addr>().unwrap()]);
        assert_eq!(settings.ipv6.prefix_lengths, vec![128]);
    }

    #[test]
    fn test_no_addresses_no_defaults() {
        let settings = generate_network_settings(None, &[]);

        assert!(settings.ipv4.addresses.is_empty());
        assert!(settings.ipv4.subnet_masks.is_empty());
        assert!(settings.ipv6.addresses.is_empty());
        assert!(settings.ipv6.prefix_lengths.is_empty());
        assert_eq!(settings.routes().count(), 0);
    }

    #[test]
    fn test_dns_resource_routes() {
        let resources = vec![Resource::dns(
            "PostHog",
            "app.posthog.com",
            Some(Ipv4Addr::new(100, 64, 0, 1)),
            Some("fd00:2021:1111::1".parse().unwrap()),
        )];
        let settings = generate_network_settings(Some(&addresses()), &resources);

        assert_eq!(
            settings.ipv4.included_routes,
            vec![Ipv4Route::host(Ipv4Addr::new(100, 64, 0, 1))]
        );
        assert_eq!(
            settings.ipv6.included_routes,
            vec![Ipv6Route::host("fd00:2021:1111::1".parse().unwrap())]
        );
    }

    #[test]
    fn test_dns_resource_without_addresses_is_skipped() {
        let resources = vec![Resource::dns("GitLab", "gitlab.mycorp.com", None, None)];
        let settings = generate_network_settings(Some(&addresses()), &resources);
        assert_eq!(settings.routes().count(), 0);
    }

    #[test]
    fn test_cidr_resource_single_route() {
        let resources = vec![Resource::cidr("VPC", "10.0.0.0/24".parse().unwrap())];
        let settings = generate_network_settings(None, &resources);

        assert_eq!(settings.ipv4.included_routes.len(), 1);
        let route = &settings.ipv4.included_routes[0];
        assert_eq!(route.destination, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(route.subnet_mask, Ipv4Addr::new(255, 255, 255, 0));
        assert!(settings.ipv6.included_routes.is_empty());
    }

    #[test]
    fn test_ipv6_cidr_goes_to_ipv6_routes() {
        let resources = vec![Resource::cidr("v6", "fd00:dead:beef::/48".parse().unwrap())];
        let settings = generate_network_settings(None, &resources);

        assert!(settings.ipv4.included_routes.is_empty());
        assert_eq!(settings.ipv6.included_routes[0].prefix_length, 48);
    }

    #[test]
    fn test_dns_and_mtu_are_fixed() {
        let settings = generate_network_settings(None, &[]);

        assert_eq!(settings.dns.servers, vec![IpAddr::V4(DNS_SENTINEL)]);
        assert_eq!(settings.dns.match_domains, vec![String::new()]);
        assert_eq!(settings.mtu, 1280);
        assert_eq!(settings.tunnel_remote_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    mod properties {
        use super::*;
        use ipnet::{IpNet, Ipv4Net, Ipv6Net};
        use proptest::prelude::*;

        fn resource() -> impl Strategy<Value = Resource> {
            prop_oneof![
                (any::<u32>(), 0u8..=32).prop_map(|(addr, prefix)| {
                    let net = Ipv4Net::new(Ipv4Addr::from(addr), prefix).unwrap();
                    Resource::cidr("v4", IpNet::V4(net))
                }),
                (any::<u128>(), 0u8..=128).prop_map(|(addr, prefix)| {
                    let net = Ipv6Net::new(Ipv6Addr::from(addr), prefix).unwrap();
                    Resource::cidr("v6", IpNet::V6(net))
                }),
                (any::<Option<u32>>(), any::<Option<u128>>()).prop_map(|(v4, v6)| {
                    Resource::dns(
                        "dns",
                        "app.example.com",
                        v4.map(Ipv4Addr::from),
                        v6.map(Ipv6Addr::from),
                    )
                }),
            ]
        }

        fn interface() -> impl Strategy<Value = Option<InterfaceAddresses>> {
            any::<Option<(u32, u128)>>().prop_map(|addrs| {
                addrs.map(|(v4, v6)| {
                    InterfaceAddresses::new(Ipv4Addr::from(v4), Ipv6Addr::from(v6))
                })
            })
        }

        proptest! {
            #[test]
            fn generation_is_idempotent(
                addresses in interface(),
                resources in prop::collection::vec(resource(), 0..16),
            ) {
                let a = generate_network_settings(addresses.as_ref(), &resources);
                let b = generate_network_settings(addresses.as_ref(), &resources);
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
            }

            #[test]
            fn one_route_per_resolved_address(
                resources in prop::collection::vec(resource(), 0..16),
            ) {
                let settings = generate_network_settings(None, &resources);
                let expected: usize = resources.iter().map(|r| r.routes().len()).sum();
                prop_assert_eq!(settings.routes().count(), expected);

                for route in &settings.ipv4.included_routes {
                    let host_bits = u32::from(route.destination) & !u32::from(route.subnet_mask);
                    prop_assert_eq!(host_bits, 0);
                }
            }

            #[test]
            fn dns_always_universal(
                addresses in interface(),
                resources in prop::collection::vec(resource(), 0..8),
            ) {
                let settings = generate_network_settings(addresses.as_ref(), &resources);
                prop_assert_eq!(settings.dns.servers.clone(), vec![IpAddr::V4(DNS_SENTINEL)]);
                prop_assert!(settings.dns.matches_all());
                prop_assert_eq!(settings.mtu, DEFAULT_MTU);
            }
        }
    }
}
