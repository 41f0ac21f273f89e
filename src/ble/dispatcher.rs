//! Connection event dispatcher.
//!
//! Registered with the stack once at startup.  Each callback is applied to
//! the registry synchronously, in whatever context the stack calls it from;
//! there is no queue.  Outcomes are logged here since the stack has no use
//! for a return value.

use crate::ble::advertising::AdvertisingController;
use crate::ble::registry::ConnectionRegistry;
use crate::ble::{ConnectionEventSink, HostStack};
use crate::error::RegistryError;

pub struct EventDispatcher<'a, S: HostStack> {
    stack: &'a S,
    registry: &'a ConnectionRegistry<S::Handle>,
    advertiser: &'a AdvertisingController<'a, S>,
}

impl<'a, S: HostStack> EventDispatcher<'a, S> {
    pub const fn new(
        stack: &'a S,
        registry: &'a ConnectionRegistry<S::Handle>,
        advertiser: &'a AdvertisingController<'a, S>,
    ) -> Self {
        Self {
            stack,
            registry,
            advertiser,
        }
    }
}

impl<'a, S: HostStack> ConnectionEventSink<S::Handle> for EventDispatcher<'a, S> {
    fn on_connected(&self, handle: &S::Handle, err: u8) {
        match self.registry.connected(self.stack, handle, err) {
            Ok(()) => {
                self.advertiser.on_connection_accepted();
                info!("Connected");
            }
            Err(RegistryError::ConnectFailed(err)) => {
                warn!("Connection failed (err {})", err);
            }
            Err(e) => {
                // Single peripheral slot: the newcomer is not tracked and
                // never receives measurements.
                warn!("Unexpected connection ignored: {}", e);
            }
        }
    }

    fn on_disconnected(&self, handle: &S::Handle, reason: u8) {
        info!("Disconnected (reason {})", reason);

        match self.registry.disconnected(self.stack, handle) {
            Ok(()) => {
                // A failed restart is already logged by the controller.
                let _ = self.advertiser.restart_after_disconnect();
            }
            Err(e) => debug!("Disconnect not applied: {}", e),
        }
    }
}
