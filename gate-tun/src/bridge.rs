//! Bounded application of tunnel settings
//!
//! The provider's completion callback is unreliable: under some conditions
//! the OS never calls it, although the settings were applied. The bridge
//! waits for the callback for at most [`SETTINGS_TIMEOUT`] and treats a
//! missing callback as success. Only an error reported by the OS fails.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::provider::{CompletionResult, TunnelProvider};
use crate::settings::TunnelNetworkSettings;
use crate::SETTINGS_TIMEOUT;

/// Applies settings through a [`TunnelProvider`] with a bounded wait
#[derive(Clone)]
pub struct SettingsBridge {
    provider: Arc<dyn TunnelProvider>,
    timeout: Duration,
}

impl SettingsBridge {
    /// Create a bridge with the default timeout
    pub fn new(provider: Arc<dyn TunnelProvider>) -> Self {
        Self {
            provider,
            timeout: SETTINGS_TIMEOUT,
        }
    }

    /// Override the completion timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Completion timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Apply `settings` and wait for the OS, at most for the timeout
    pub async fn apply(&self, settings: &TunnelNetworkSettings) -> Result<()> {
        let (tx, rx) = oneshot::channel::<CompletionResult>();

        self.provider.set_tunnel_network_settings(
            settings,
            Box::new(move |result| {
                // The receiver is gone if we already timed out.
                let _ = tx.send(result);
            }),
        )?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => Self::finish(result),
            Ok(Err(_)) => {
                log::warn!("Tunnel provider dropped the completion callback, assuming settings applied");
                Ok(())
            }
            Err(_) => {
                log::warn!(
                    "No completion from tunnel provider after {:?}, assuming settings applied",
                    self.timeout
                );
                Ok(())
            }
        }
    }

    /// Apply `settings`, parking the calling thread until completion or timeout
    ///
    /// For callers outside an async runtime. Must not be called from a
    /// runtime worker thread.
    pub fn apply_blocking(&self, settings: &TunnelNetworkSettings) -> Result<()> {
        let (tx, rx) = mpsc::sync_channel::<CompletionResult>(1);

        self.provider.set_tunnel_network_settings(
            settings,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        )?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => Self::finish(result),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::warn!("Tunnel provider dropped the completion callback, assuming settings applied");
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!(
                    "No completion from tunnel provider after {:?}, assuming settings applied",
                    self.timeout
                );
                Ok(())
            }
        }
    }

    fn finish(result: CompletionResult) -> Result<()> {
        match result {
            Ok(()) => {
                log::debug!("Tunnel settings applied");
                Ok(())
            }
            Err(cause) => Err(Error::SettingsRejected(cause)),
        }
    }
}

impl std::fmt::Debug for SettingsBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsBridge")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CompletionBehavior, MockTunnelProvider};
    use std::net::Ipv4Addr;

    fn settings() -> TunnelNetworkSettings {
        TunnelNetworkSettings::new(Ipv4Addr::LOCALHOST)
    }

    #[tokio::test]
    async fn test_apply_success() {
        let provider = Arc::new(MockTunnelProvider::new());
        let bridge = SettingsBridge::new(provider.clone());

        bridge.apply(&settings()).await.unwrap();
        assert_eq!(provider.apply_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_rejected() {
        let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Fail(
            "bad route".into(),
        )));
        let bridge = SettingsBridge::new(provider);

        let err = bridge.apply(&settings()).await.unwrap_err();
        assert!(err.is_rejected());
        assert!(err.to_string().contains("bad route"));
    }

    #[test]
    fn test_apply_blocking_timeout() {
        let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Never));
        let bridge = SettingsBridge::new(provider).with_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        bridge.apply_blocking(&settings()).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_apply_blocking_rejected() {
        let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Fail(
            "denied".into(),
        )));
        let bridge = SettingsBridge::new(provider);
        assert!(bridge.apply_blocking(&settings()).is_err());
    }
}
