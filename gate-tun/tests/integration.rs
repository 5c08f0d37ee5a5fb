//! Integration tests for gate-tun
//!
//! These tests drive the settings bridge against the mock provider and
//! verify that every completion behavior of the OS surface ends in a
//! bounded, well-defined result.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use gate_tun::mock::{CompletionBehavior, MockTunnelProvider};
use gate_tun::{
    DnsSettings, Ipv4Route, Ipv4Settings, Ipv6Route, Ipv6Settings, SettingsBridge,
    TunnelNetworkSettings, DEFAULT_MTU, SETTINGS_TIMEOUT,
};

fn sample_settings() -> TunnelNetworkSettings {
    TunnelNetworkSettings::new(Ipv4Addr::LOCALHOST)
        .with_ipv4(
            Ipv4Settings::default()
                .with_host_address(Ipv4Addr::new(100, 100, 111, 2))
                .with_route(Ipv4Route::host(Ipv4Addr::new(100, 64, 0, 1))),
        )
        .with_ipv6(
            Ipv6Settings::default()
                .with_host_address("fd00::2".parse::<Ipv6Addr>().unwrap())
                .with_route(Ipv6Route::host("fd00:2021:1111::1".parse().unwrap())),
        )
        .with_dns(DnsSettings::match_all(vec![IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))]))
}

/// The provider receives exactly the settings we asked for
#[tokio::test]
async fn test_bridge_passes_settings_through() {
    let provider = Arc::new(MockTunnelProvider::new());
    let bridge = SettingsBridge::new(provider.clone());
    let settings = sample_settings();

    bridge.apply(&settings).await.unwrap();

    assert_eq!(provider.last_applied(), Some(settings));
    assert_eq!(provider.last_applied().unwrap().mtu, DEFAULT_MTU);
}

/// A provider that never completes releases the caller after the timeout
#[tokio::test(start_paused = true)]
async fn test_bridge_timeout_is_success() {
    let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Never));
    let bridge = SettingsBridge::new(provider.clone());
    assert_eq!(bridge.timeout(), SETTINGS_TIMEOUT);

    let started = tokio::time::Instant::now();
    let result = bridge.apply(&sample_settings()).await;
    let elapsed = started.elapsed();

    assert!(result.is_ok());
    assert!(elapsed >= SETTINGS_TIMEOUT);
    assert!(elapsed < SETTINGS_TIMEOUT + Duration::from_millis(100));
    assert_eq!(provider.pending_count(), 1);
}

/// A completion arriving after the timeout is discarded without panicking
#[tokio::test(start_paused = true)]
async fn test_bridge_late_completion_discarded() {
    let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Never));
    let bridge = SettingsBridge::new(provider.clone());

    bridge.apply(&sample_settings()).await.unwrap();
    provider.complete_pending(Err("too late".into()));
    assert_eq!(provider.pending_count(), 0);
}

/// Dropping the completion is treated like a missing callback
#[tokio::test]
async fn test_bridge_dropped_completion() {
    let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Drop));
    let bridge = SettingsBridge::new(provider);

    let result = tokio::time::timeout(Duration::from_secs(1), bridge.apply(&sample_settings())).await;
    assert!(matches!(result, Ok(Ok(()))));
}

/// Completion may arrive on a foreign thread
#[tokio::test]
async fn test_bridge_completion_on_thread() {
    let provider = Arc::new(MockTunnelProvider::with_behavior(
        CompletionBehavior::SucceedOnThread,
    ));
    let bridge = SettingsBridge::new(provider.clone());

    bridge.apply(&sample_settings()).await.unwrap();
    assert_eq!(provider.apply_count(), 1);
}

/// An OS-reported error fails the call
#[tokio::test]
async fn test_bridge_os_error() {
    let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Fail(
        "The operation couldn't be completed".into(),
    )));
    let bridge = SettingsBridge::new(provider);

    let err = bridge.apply(&sample_settings()).await.unwrap_err();
    assert!(matches!(err, gate_tun::Error::SettingsRejected(_)));
}

/// A provider that cannot issue the request fails without waiting
#[tokio::test]
async fn test_bridge_refused_request() {
    let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Refuse(
        "no tunnel provider".into(),
    )));
    let bridge = SettingsBridge::new(provider.clone());

    let err = bridge.apply(&sample_settings()).await.unwrap_err();
    assert!(matches!(err, gate_tun::Error::Provider(_)));
    assert_eq!(provider.apply_count(), 0);
}

/// The blocking variant works from a plain thread
#[test]
fn test_bridge_blocking_from_thread() {
    let provider = Arc::new(MockTunnelProvider::with_behavior(
        CompletionBehavior::SucceedOnThread,
    ));
    let bridge = SettingsBridge::new(provider.clone());

    std::thread::spawn(move || bridge.apply_blocking(&sample_settings()))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(provider.apply_count(), 1);
}

/// Settings serialize identically when built identically
#[test]
fn test_settings_serialization_is_stable() {
    let a = serde_json::to_vec(&sample_settings()).unwrap();
    let b = serde_json::to_vec(&sample_settings()).unwrap();
    assert_eq!(a, b);

    let parsed: TunnelNetworkSettings = serde_json::from_slice(&a).unwrap();
    assert_eq!(parsed, sample_settings());
}
