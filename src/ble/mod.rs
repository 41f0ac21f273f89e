//! Bluetooth Low Energy lifecycle.
//!
//! This module drives the peripheral role against an abstract host stack:
//!
//! 1. **Advertising** - broadcasts the Heart Rate Service descriptor and
//!    restarts broadcasting once the single connection slot frees up.
//! 2. **Registry** - holds the one live connection reference and applies
//!    acquire/release transitions.
//! 3. **Dispatcher** - receives the stack's connection callbacks and
//!    forwards them into the registry and the advertiser.
//!
//! The concrete stack (Nordic SoftDevice S140) lives in the embedded binary
//! and implements [`HostStack`]; host tests use a mock.

pub mod adv_data;
pub mod advertising;
pub mod dispatcher;
pub mod registry;

use crate::error::{NotifyError, StackError};
use advertising::AdvertisingDescriptor;

/// HCI status for a successful connection.
pub const HCI_SUCCESS: u8 = 0x00;

/// HCI reason "Remote User Terminated Connection".
pub const HCI_REMOTE_USER_TERMINATED: u8 = 0x13;

/// A stack connection tagged with the handle it was assigned when it came
/// up.  Equality compares that handle only, so a link still identifies
/// itself after the stack has torn it down and `conn` reports nothing.
#[derive(Clone, Debug)]
pub struct Link<C> {
    handle: u16,
    conn: C,
}

impl<C> Link<C> {
    pub const fn new(handle: u16, conn: C) -> Self {
        Self { handle, conn }
    }

    pub fn handle(&self) -> u16 {
        self.handle
    }

    pub fn conn(&self) -> &C {
        &self.conn
    }
}

impl<C> PartialEq for Link<C> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

/// Connection callbacks the stack invokes from its own execution context.
///
/// Implementations must not block; the stack may call them concurrently
/// with the periodic notification task.
pub trait ConnectionEventSink<H> {
    /// A central connected (`err == 0`) or a connection attempt failed.
    fn on_connected(&self, handle: &H, err: u8);

    /// The link identified by `handle` dropped with HCI `reason`.
    fn on_disconnected(&self, handle: &H, reason: u8);
}

/// Capabilities consumed from the BLE host stack.
pub trait HostStack {
    /// Reference to one established link.
    ///
    /// Each value returned by [`HostStack::acquire`] keeps the link's
    /// resources alive until passed back to [`HostStack::release`].
    type Handle: PartialEq + 'static;

    /// One-time stack initialization.
    fn enable(&self) -> Result<(), StackError>;

    /// Start connectable advertising with `descriptor`.
    fn start_advertising(&self, descriptor: &AdvertisingDescriptor) -> Result<(), StackError>;

    /// Stop advertising.
    fn stop_advertising(&self) -> Result<(), StackError>;

    /// Install the connection callbacks.
    fn register_connection_callbacks(&self, sink: &'static dyn ConnectionEventSink<Self::Handle>);

    /// Take an additional reference to `handle`.
    fn acquire(&self, handle: &Self::Handle) -> Self::Handle;

    /// Give back a reference obtained from [`HostStack::acquire`].
    fn release(&self, handle: Self::Handle);

    /// Push a Heart Rate Measurement value to the peer behind `handle`.
    fn notify(&self, handle: &Self::Handle, value: &[u8]) -> Result<(), NotifyError>;
}
