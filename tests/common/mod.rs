//! Host double for the BLE stack shared by the integration tests.
//!
//! Tracks reference counts per connection id so tests can assert that the
//! registry never double-releases and that every notification is made on a
//! handle somebody still holds.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use kinpathic_hrm::ble::{ConnectionEventSink, HostStack};
use kinpathic_hrm::error::{NotifyError, StackError};
use kinpathic_hrm::{
    AdvertisingController, AdvertisingDescriptor, ConnectionRegistry, EventDispatcher,
    HEART_RATE_ADVERTISING,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u16);

#[derive(Default)]
struct Inner {
    enable_err: Option<StackError>,
    adv_err: Option<StackError>,
    notify_err: Option<NotifyError>,
    enabled: bool,
    advertising: bool,
    adv_starts: u32,
    refs: HashMap<u16, i32>,
    over_released: bool,
    notified_unheld: bool,
    notify_attempts: u32,
    notifications: Vec<(ConnId, Vec<u8>)>,
}

#[derive(Default)]
pub struct MockStack {
    inner: Mutex<Inner>,
    callbacks_registered: AtomicBool,
}

impl MockStack {
    pub fn failing_enable(err: StackError) -> Self {
        let stack = Self::default();
        stack.lock().enable_err = Some(err);
        stack
    }

    pub fn failing_advertising(err: StackError) -> Self {
        let stack = Self::default();
        stack.lock().adv_err = Some(err);
        stack
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_notify_error(&self, err: Option<NotifyError>) {
        self.lock().notify_err = err;
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn is_advertising(&self) -> bool {
        self.lock().advertising
    }

    pub fn adv_starts(&self) -> u32 {
        self.lock().adv_starts
    }

    pub fn callbacks_registered(&self) -> bool {
        self.callbacks_registered.load(Ordering::SeqCst)
    }

    pub fn refs(&self, id: u16) -> i32 {
        self.lock().refs.get(&id).copied().unwrap_or(0)
    }

    /// Number of connection ids with at least one outstanding reference.
    pub fn live_handles(&self) -> usize {
        self.lock().refs.values().filter(|&&n| n > 0).count()
    }

    pub fn over_released(&self) -> bool {
        self.lock().over_released
    }

    pub fn notified_unheld(&self) -> bool {
        self.lock().notified_unheld
    }

    pub fn notify_attempts(&self) -> u32 {
        self.lock().notify_attempts
    }

    pub fn notifications(&self) -> Vec<(ConnId, Vec<u8>)> {
        self.lock().notifications.clone()
    }

    /// The stack stops advertising on its own once a central connects.
    pub fn accept_connection(&self) {
        self.lock().advertising = false;
    }
}

impl HostStack for MockStack {
    type Handle = ConnId;

    fn enable(&self) -> Result<(), StackError> {
        let mut inner = self.lock();
        if let Some(e) = inner.enable_err {
            return Err(e);
        }
        if inner.enabled {
            return Err(StackError::AlreadyEnabled);
        }
        inner.enabled = true;
        Ok(())
    }

    fn start_advertising(&self, descriptor: &AdvertisingDescriptor) -> Result<(), StackError> {
        let mut inner = self.lock();
        if !inner.enabled {
            return Err(StackError::NotEnabled);
        }
        if let Some(e) = inner.adv_err {
            return Err(e);
        }
        descriptor.adv_data()?;
        descriptor.scan_data()?;
        inner.advertising = true;
        inner.adv_starts += 1;
        Ok(())
    }

    fn stop_advertising(&self) -> Result<(), StackError> {
        self.lock().advertising = false;
        Ok(())
    }

    fn register_connection_callbacks(&self, _sink: &'static dyn ConnectionEventSink<ConnId>) {
        self.callbacks_registered.store(true, Ordering::SeqCst);
    }

    fn acquire(&self, handle: &ConnId) -> ConnId {
        *self.lock().refs.entry(handle.0).or_insert(0) += 1;
        *handle
    }

    fn release(&self, handle: ConnId) {
        let mut inner = self.lock();
        let count = inner.refs.entry(handle.0).or_insert(0);
        *count -= 1;
        if *count < 0 {
            inner.over_released = true;
        }
    }

    fn notify(&self, handle: &ConnId, value: &[u8]) -> Result<(), NotifyError> {
        let mut inner = self.lock();
        inner.notify_attempts += 1;
        if inner.refs.get(&handle.0).copied().unwrap_or(0) <= 0 {
            inner.notified_unheld = true;
        }
        if let Some(e) = inner.notify_err {
            return Err(e);
        }
        inner.notifications.push((*handle, value.to_vec()));
        Ok(())
    }
}

/// Fully wired components with `'static` lifetimes, as on target.
pub struct Rig {
    pub stack: &'static MockStack,
    pub registry: &'static ConnectionRegistry<ConnId>,
    pub advertiser: &'static AdvertisingController<'static, MockStack>,
    pub dispatcher: &'static EventDispatcher<'static, MockStack>,
}

pub fn rig(stack: MockStack) -> Rig {
    let stack: &'static MockStack = Box::leak(Box::new(stack));
    let registry: &'static ConnectionRegistry<ConnId> =
        Box::leak(Box::new(ConnectionRegistry::new()));
    let advertiser: &'static AdvertisingController<'static, MockStack> = Box::leak(Box::new(
        AdvertisingController::new(stack, &HEART_RATE_ADVERTISING),
    ));
    let dispatcher: &'static EventDispatcher<'static, MockStack> =
        Box::leak(Box::new(EventDispatcher::new(stack, registry, advertiser)));
    Rig {
        stack,
        registry,
        advertiser,
        dispatcher,
    }
}

impl Rig {
    /// What the stack does when a central connects.
    pub fn connect(&self, id: u16, err: u8) {
        if err == 0 {
            self.stack.accept_connection();
        }
        self.dispatcher.on_connected(&ConnId(id), err);
    }

    pub fn disconnect(&self, id: u16, reason: u8) {
        self.dispatcher.on_disconnected(&ConnId(id), reason);
    }
}
