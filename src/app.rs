//! Startup routine.
//!
//! Enables the stack, registers the connection callbacks and starts
//! advertising, in that order.  Every failure is logged and reported as a
//! [`Startup`] variant; none of them stops the process.

use crate::ble::advertising::AdvertisingController;
use crate::ble::dispatcher::EventDispatcher;
use crate::ble::HostStack;
use crate::error::{AdvertisingError, Error, StackError};

/// How far startup got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Startup {
    /// Stack enabled, callbacks registered, advertising.
    Ready,
    /// Stack enabled and callbacks registered, but not discoverable.
    AdvertisingUnavailable(StackError),
    /// The stack could not be enabled; nothing else was attempted.
    Inert(StackError),
}

impl Startup {
    pub fn is_ready(&self) -> bool {
        matches!(self, Startup::Ready)
    }
}

pub fn startup<S: HostStack + 'static>(
    stack: &'static S,
    dispatcher: &'static EventDispatcher<'static, S>,
    advertiser: &AdvertisingController<'_, S>,
) -> Startup {
    info!("Starting Kinpathic Heart Rate Monitor");

    match bring_up(stack, dispatcher, advertiser) {
        Ok(()) => Startup::Ready,
        Err(Error::Stack(e)) => Startup::Inert(e),
        Err(Error::Advertising(AdvertisingError::Unavailable(e))) => {
            Startup::AdvertisingUnavailable(e)
        }
    }
}

fn bring_up<S: HostStack + 'static>(
    stack: &'static S,
    dispatcher: &'static EventDispatcher<'static, S>,
    advertiser: &AdvertisingController<'_, S>,
) -> Result<(), Error> {
    stack.enable().map_err(|e| {
        error!("Bluetooth init failed ({})", e);
        e
    })?;
    info!("Bluetooth initialized");

    stack.register_connection_callbacks(dispatcher);

    // The controller logs its own failure.
    advertiser.start()?;
    Ok(())
}
