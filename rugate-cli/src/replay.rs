//! Engine stand-in that replays a fixed resource list

use tracing::{debug, info};

use rugate_engine::{EngineCallbacks, InterfaceAddresses, SessionConnector, SessionError, SessionHandle};

/// Connector that delivers the same addresses and resources on every connect
pub struct ReplayConnector {
    resources: Vec<u8>,
    addresses: Option<InterfaceAddresses>,
}

impl ReplayConnector {
    pub fn new(resources: Vec<u8>, addresses: Option<InterfaceAddresses>) -> Self {
        Self {
            resources,
            addresses,
        }
    }
}

impl SessionConnector for ReplayConnector {
    fn connect(
        &self,
        portal_url: &str,
        _token: &str,
        callbacks: EngineCallbacks,
    ) -> Result<Box<dyn SessionHandle>, SessionError> {
        info!("Replaying engine session for {}", portal_url);

        if let Some(addresses) = self.addresses {
            callbacks.interface_addresses_updated(
                &addresses.ipv4.to_string(),
                &addresses.ipv6.to_string(),
            );
        }
        callbacks.resources_updated(&self.resources);

        Ok(Box::new(ReplaySession))
    }
}

struct ReplaySession;

impl SessionHandle for ReplaySession {
    fn disconnect(self: Box<Self>) {
        info!("Replayed session disconnected");
    }

    fn bump_sockets(&self) {
        debug!("Bump sockets");
    }

    fn disable_roaming_workaround(&self) {
        debug!("Disable roaming workaround");
    }
}
