//! Mock tunnel provider for testing
//!
//! [`MockTunnelProvider`] records every settings object it is asked to apply
//! and completes according to a configurable [`CompletionBehavior`], which
//! makes it possible to simulate the OS rejecting settings, completing from a
//! foreign thread, or never calling back at all.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gate_tun::mock::{CompletionBehavior, MockTunnelProvider};
//! use gate_tun::SettingsBridge;
//!
//! let provider = Arc::new(MockTunnelProvider::with_behavior(CompletionBehavior::Never));
//! let bridge = SettingsBridge::new(provider.clone());
//! bridge.apply(&settings).await?; // returns Ok after the timeout
//! assert_eq!(provider.apply_count(), 1);
//! ```

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::provider::{Completion, CompletionResult, TunnelProvider};
use crate::settings::TunnelNetworkSettings;

/// How the mock reacts to a settings request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionBehavior {
    /// Complete successfully, inline
    Succeed,
    /// Complete with an OS error, inline
    Fail(String),
    /// Complete successfully from a spawned thread
    SucceedOnThread,
    /// Keep the completion without ever calling it
    Never,
    /// Drop the completion without calling it
    Drop,
    /// Refuse to issue the request
    Refuse(String),
}

/// Recording tunnel provider
pub struct MockTunnelProvider {
    behavior: Mutex<CompletionBehavior>,
    applied: Mutex<Vec<TunnelNetworkSettings>>,
    pending: Mutex<Vec<Completion>>,
}

impl MockTunnelProvider {
    /// Create a provider that always succeeds
    pub fn new() -> Self {
        Self::with_behavior(CompletionBehavior::Succeed)
    }

    /// Create a provider with the given behavior
    pub fn with_behavior(behavior: CompletionBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            applied: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Change the behavior for subsequent requests
    pub fn set_behavior(&self, behavior: CompletionBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Every settings object received, in order
    pub fn applied(&self) -> Vec<TunnelNetworkSettings> {
        self.applied.lock().unwrap().clone()
    }

    /// The most recently received settings
    pub fn last_applied(&self) -> Option<TunnelNetworkSettings> {
        self.applied.lock().unwrap().last().cloned()
    }

    /// Number of requests received
    pub fn apply_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    /// Number of completions held back by [`CompletionBehavior::Never`]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Fire every held-back completion with `result`
    pub fn complete_pending(&self, result: CompletionResult) {
        let pending: Vec<Completion> = self.pending.lock().unwrap().drain(..).collect();
        for completion in pending {
            completion(result.clone());
        }
    }
}

impl std::fmt::Debug for MockTunnelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTunnelProvider")
            .field("behavior", &*self.behavior.lock().unwrap())
            .field("apply_count", &self.apply_count())
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

impl Default for MockTunnelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TunnelProvider for MockTunnelProvider {
    fn set_tunnel_network_settings(
        &self,
        settings: &TunnelNetworkSettings,
        completion: Completion,
    ) -> Result<()> {
        let behavior = self.behavior.lock().unwrap().clone();
        if let CompletionBehavior::Refuse(reason) = &behavior {
            return Err(Error::Provider(reason.clone()));
        }

        self.applied.lock().unwrap().push(settings.clone());

        match behavior {
            CompletionBehavior::Succeed => completion(Ok(())),
            CompletionBehavior::Fail(cause) => completion(Err(cause)),
            CompletionBehavior::SucceedOnThread => {
                std::thread::spawn(move || completion(Ok(())));
            }
            CompletionBehavior::Never => self.pending.lock().unwrap().push(completion),
            CompletionBehavior::Drop => drop(completion),
            CompletionBehavior::Refuse(_) => {}
        }

        Ok(())
    }
}
