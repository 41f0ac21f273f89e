//! Single-slot connection registry.
//!
//! Holds at most one live connection reference.  The dispatcher mutates
//! the slot from the stack's callback context while the notification task
//! reads it from its own; both go through a critical-section mutex so each
//! access is atomic with respect to the other.
//!
//! State machine:
//! ```text
//!   Idle --connected(ok)--------> Connected   acquire + store
//!   Idle --connected(err)-------> Idle        nothing stored
//!   Connected --connected(*)----> Connected   rejected, slot untouched
//!   Connected --disconnected----> Idle        release + clear
//!   Idle --disconnected---------> Idle        ignored, nothing released
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::ble::{HostStack, HCI_SUCCESS};
use crate::error::RegistryError;

/// Registry state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Idle,
    Connected,
}

pub struct ConnectionRegistry<H> {
    slot: Mutex<CriticalSectionRawMutex, RefCell<Option<H>>>,
}

impl<H> ConnectionRegistry<H> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(None)),
        }
    }

    /// Current state, safe to call from any context.
    pub fn current(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Idle
        }
    }

    pub fn is_connected(&self) -> bool {
        self.slot.lock(|slot| slot.borrow().is_some())
    }

    /// Apply a `connected` callback.
    ///
    /// On success the registry holds its own reference to `handle`.
    pub fn connected<S>(&self, stack: &S, handle: &H, err: u8) -> Result<(), RegistryError>
    where
        S: HostStack<Handle = H>,
    {
        if err != HCI_SUCCESS {
            return Err(RegistryError::ConnectFailed(err));
        }

        self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_some() {
                return Err(RegistryError::SlotOccupied);
            }
            *slot = Some(stack.acquire(handle));
            Ok(())
        })
    }

    /// Apply a `disconnected` callback.
    ///
    /// Releases the held reference only if `handle` is the one held, so a
    /// repeated or stray disconnect never releases twice.
    pub fn disconnected<S>(&self, stack: &S, handle: &H) -> Result<(), RegistryError>
    where
        S: HostStack<Handle = H>,
        H: PartialEq,
    {
        let held = self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            let matches = match slot.as_ref() {
                None => return Err(RegistryError::NotConnected),
                Some(held) => held == handle,
            };
            if !matches {
                return Err(RegistryError::UnknownHandle);
            }
            Ok(slot.take())
        })?;

        // Released outside the critical section; readers that raced us hold
        // their own reference.
        if let Some(held) = held {
            stack.release(held);
        }
        Ok(())
    }

    /// Take a reference to the live connection for the duration of one
    /// operation.  The caller must hand it back with [`HostStack::release`].
    pub fn acquire_current<S>(&self, stack: &S) -> Option<H>
    where
        S: HostStack<Handle = H>,
    {
        self.slot
            .lock(|slot| slot.borrow().as_ref().map(|held| stack.acquire(held)))
    }
}

impl<H> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::advertising::AdvertisingDescriptor;
    use crate::ble::ConnectionEventSink;
    use crate::error::{NotifyError, StackError};
    use core::cell::Cell;

    /// Counts live references per handle id.
    struct CountingStack {
        refs: RefCell<[i32; 4]>,
        acquires: Cell<u32>,
    }

    impl CountingStack {
        fn new() -> Self {
            Self {
                refs: RefCell::new([0; 4]),
                acquires: Cell::new(0),
            }
        }

        fn refs(&self, id: u8) -> i32 {
            self.refs.borrow()[id as usize]
        }
    }

    impl HostStack for CountingStack {
        type Handle = u8;

        fn enable(&self) -> Result<(), StackError> {
            Ok(())
        }
        fn start_advertising(&self, _: &AdvertisingDescriptor) -> Result<(), StackError> {
            Ok(())
        }
        fn stop_advertising(&self) -> Result<(), StackError> {
            Ok(())
        }
        fn register_connection_callbacks(&self, _: &'static dyn ConnectionEventSink<u8>) {}
        fn acquire(&self, handle: &u8) -> u8 {
            self.refs.borrow_mut()[*handle as usize] += 1;
            self.acquires.set(self.acquires.get() + 1);
            *handle
        }
        fn release(&self, handle: u8) {
            self.refs.borrow_mut()[handle as usize] -= 1;
        }
        fn notify(&self, _: &u8, _: &[u8]) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[test]
    fn starts_idle() {
        let registry: ConnectionRegistry<u8> = ConnectionRegistry::new();
        assert_eq!(registry.current(), ConnectionState::Idle);
    }

    #[test]
    fn connect_acquires_one_reference() {
        let stack = CountingStack::new();
        let registry = ConnectionRegistry::new();

        registry.connected(&stack, &1, 0).unwrap();
        assert_eq!(registry.current(), ConnectionState::Connected);
        assert_eq!(stack.refs(1), 1);
    }

    #[test]
    fn failed_connect_stores_nothing() {
        let stack = CountingStack::new();
        let registry = ConnectionRegistry::new();

        assert_eq!(
            registry.connected(&stack, &1, 5),
            Err(RegistryError::ConnectFailed(5))
        );
        assert_eq!(registry.current(), ConnectionState::Idle);
        assert_eq!(stack.acquires.get(), 0);
    }

    #[test]
    fn second_connect_is_rejected() {
        let stack = CountingStack::new();
        let registry = ConnectionRegistry::new();

        registry.connected(&stack, &1, 0).unwrap();
        assert_eq!(
            registry.connected(&stack, &2, 0),
            Err(RegistryError::SlotOccupied)
        );
        assert_eq!(stack.refs(2), 0);

        // The first connection is still the one held.
        registry.disconnected(&stack, &1).unwrap();
        assert_eq!(stack.refs(1), 0);
    }

    #[test]
    fn disconnect_releases_and_clears() {
        let stack = CountingStack::new();
        let registry = ConnectionRegistry::new();

        registry.connected(&stack, &1, 0).unwrap();
        registry.disconnected(&stack, &1).unwrap();
        assert_eq!(registry.current(), ConnectionState::Idle);
        assert_eq!(stack.refs(1), 0);
    }

    #[test]
    fn double_disconnect_does_not_double_release() {
        let stack = CountingStack::new();
        let registry = ConnectionRegistry::new();

        registry.connected(&stack, &1, 0).unwrap();
        registry.disconnected(&stack, &1).unwrap();
        assert_eq!(
            registry.disconnected(&stack, &1),
            Err(RegistryError::NotConnected)
        );
        assert_eq!(stack.refs(1), 0);
    }

    #[test]
    fn stray_disconnect_keeps_held_connection() {
        let stack = CountingStack::new();
        let registry = ConnectionRegistry::new();

        registry.connected(&stack, &1, 0).unwrap();
        assert_eq!(
            registry.disconnected(&stack, &3),
            Err(RegistryError::UnknownHandle)
        );
        assert_eq!(registry.current(), ConnectionState::Connected);
        assert_eq!(stack.refs(1), 1);
        assert_eq!(stack.refs(3), 0);
    }

    #[test]
    fn reader_reference_outlives_disconnect() {
        let stack = CountingStack::new();
        let registry = ConnectionRegistry::new();

        registry.connected(&stack, &1, 0).unwrap();
        let reader = registry.acquire_current(&stack).unwrap();
        assert_eq!(stack.refs(1), 2);

        registry.disconnected(&stack, &1).unwrap();
        assert_eq!(stack.refs(1), 1, "reader still holds its reference");

        stack.release(reader);
        assert_eq!(stack.refs(1), 0);
        assert!(registry.acquire_current(&stack).is_none());
    }
}
