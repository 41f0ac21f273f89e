//! Advertising descriptor and controller.
//!
//! The descriptor is built once at compile time and never changes.  The
//! controller starts and stops broadcasting it and tracks whether the stack
//! paused advertising because the single connection slot is taken, so it
//! can resume once that connection drops.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::ble::adv_data::{self, AdPayload, AD_FLAGS, AD_NAME_COMPLETE, AD_UUID16_COMPLETE};
use crate::ble::HostStack;
use crate::config;
use crate::error::{AdvertisingError, StackError};
use crate::hrs::HRS_UUID16;

/// Flags bit: LE General Discoverable Mode.
pub const FLAG_LE_GENERAL_DISCOVERABLE: u8 = 0x02;
/// Flags bit: BR/EDR Not Supported.
pub const FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;

/// Advertising options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingOptions {
    /// Accept connection requests.
    pub connectable: bool,
    /// Put the device name in the scan response.
    pub use_name: bool,
}

/// Everything the stack needs to broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvertisingDescriptor {
    pub flags: u8,
    /// Complete list of 16-bit service UUIDs.
    pub services: &'static [u16],
    pub options: AdvertisingOptions,
    /// Interval bounds in 0.625 ms units.
    pub interval_min: u16,
    pub interval_max: u16,
    pub name: &'static str,
}

/// The Heart Rate Service advertisement used by the device.
pub static HEART_RATE_ADVERTISING: AdvertisingDescriptor = AdvertisingDescriptor::heart_rate();

impl AdvertisingDescriptor {
    /// General discoverable, LE only, listing the Heart Rate Service.
    pub const fn heart_rate() -> Self {
        Self {
            flags: FLAG_LE_GENERAL_DISCOVERABLE | FLAG_BR_EDR_NOT_SUPPORTED,
            services: &[HRS_UUID16],
            options: AdvertisingOptions {
                connectable: true,
                use_name: true,
            },
            interval_min: config::ADV_INTERVAL_MIN,
            interval_max: config::ADV_INTERVAL_MAX,
            name: config::DEVICE_NAME,
        }
    }

    /// Advertising data: flags followed by the service UUID list.
    pub fn adv_data(&self) -> Result<AdPayload, StackError> {
        let mut out = AdPayload::new();
        adv_data::push_structure(&mut out, AD_FLAGS, &[self.flags])
            .map_err(|_| StackError::PayloadTooLarge)?;
        if !self.services.is_empty() {
            adv_data::push_uuid16_list(&mut out, AD_UUID16_COMPLETE, self.services)
                .map_err(|_| StackError::PayloadTooLarge)?;
        }
        Ok(out)
    }

    /// Scan response data: the complete local name, when `use_name` is set.
    pub fn scan_data(&self) -> Result<AdPayload, StackError> {
        let mut out = AdPayload::new();
        if self.options.use_name {
            adv_data::push_structure(&mut out, AD_NAME_COMPLETE, self.name.as_bytes())
                .map_err(|_| StackError::PayloadTooLarge)?;
        }
        Ok(out)
    }
}

/// Broadcast state as seen by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingState {
    /// Never started, or stopped on request.
    Stopped,
    /// Discoverable and connectable.
    Advertising,
    /// The stack stopped broadcasting because a central connected.
    Paused,
    /// A restart after disconnect is in flight.  `stop()` may still cancel it.
    Restarting,
    /// The stack refused to start; the device is not discoverable.
    Unavailable,
}

/// Starts and stops the fixed advertisement.
pub struct AdvertisingController<'a, S: HostStack> {
    stack: &'a S,
    descriptor: &'a AdvertisingDescriptor,
    state: Mutex<CriticalSectionRawMutex, Cell<AdvertisingState>>,
}

impl<'a, S: HostStack> AdvertisingController<'a, S> {
    pub const fn new(stack: &'a S, descriptor: &'a AdvertisingDescriptor) -> Self {
        Self {
            stack,
            descriptor,
            state: Mutex::new(Cell::new(AdvertisingState::Stopped)),
        }
    }

    pub fn state(&self) -> AdvertisingState {
        self.state.lock(|s| s.get())
    }

    /// Begin broadcasting.  On failure the device stays non-discoverable;
    /// the caller decides whether that is worth more than a log line.
    pub fn start(&self) -> Result<(), AdvertisingError> {
        match self.stack.start_advertising(self.descriptor) {
            Ok(()) => {
                self.set_state(AdvertisingState::Advertising);
                info!("Advertising successfully started");
                Ok(())
            }
            Err(e) => {
                self.set_state(AdvertisingState::Unavailable);
                error!("Advertising failed to start ({})", e);
                Err(AdvertisingError::Unavailable(e))
            }
        }
    }

    /// Stop broadcasting.  Also cancels the restart after the current
    /// connection drops, including one already in flight.
    pub fn stop(&self) -> Result<(), StackError> {
        // Published before the stack call so a concurrent restart sees it.
        let previous = self.state.lock(|s| s.replace(AdvertisingState::Stopped));

        if let Err(e) = self.stack.stop_advertising() {
            self.state.lock(|s| {
                if s.get() == AdvertisingState::Stopped {
                    s.set(previous);
                }
            });
            warn!("Advertising failed to stop ({})", e);
            return Err(e);
        }
        info!("Advertising stopped");
        Ok(())
    }

    /// The stack accepted a connection and stopped broadcasting.
    pub fn on_connection_accepted(&self) {
        self.state.lock(|s| {
            if s.get() == AdvertisingState::Advertising {
                s.set(AdvertisingState::Paused);
            }
        });
    }

    /// Resume broadcasting if it was paused by a connection.  Does nothing
    /// after an explicit stop or a failed start.
    pub fn restart_after_disconnect(&self) -> Result<(), AdvertisingError> {
        let claimed = self.state.lock(|s| {
            if s.get() == AdvertisingState::Paused {
                s.set(AdvertisingState::Restarting);
                true
            } else {
                false
            }
        });
        if !claimed {
            debug!("Advertising not paused; no restart");
            return Ok(());
        }

        match self.stack.start_advertising(self.descriptor) {
            Ok(()) => {
                let cancelled = self.state.lock(|s| {
                    if s.get() == AdvertisingState::Restarting {
                        s.set(AdvertisingState::Advertising);
                        false
                    } else {
                        true
                    }
                });
                if cancelled {
                    // stop() landed while the stack was starting.
                    if let Err(e) = self.stack.stop_advertising() {
                        warn!("Advertising failed to stop after restart ({})", e);
                    }
                    info!("Advertising restart cancelled");
                } else {
                    info!("Advertising successfully started");
                }
                Ok(())
            }
            Err(e) => {
                self.state.lock(|s| {
                    if s.get() == AdvertisingState::Restarting {
                        s.set(AdvertisingState::Unavailable);
                    }
                });
                error!("Advertising failed to start ({})", e);
                Err(AdvertisingError::Unavailable(e))
            }
        }
    }

    fn set_state(&self, state: AdvertisingState) {
        self.state.lock(|s| s.set(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::adv_data::parse::{contains_service_uuid16, extract_device_name, flags};
    use crate::ble::ConnectionEventSink;
    use crate::error::NotifyError;

    /// Stack double that can call back into the controller from inside
    /// `start_advertising`, the way another execution context could.
    #[derive(Default)]
    struct ReentrantStack {
        broadcasting: Cell<bool>,
        starts: Cell<u32>,
        stops: Cell<u32>,
        stop_on_start: Cell<Option<u32>>,
        fail_stop: Cell<bool>,
        controller: Cell<Option<&'static AdvertisingController<'static, ReentrantStack>>>,
    }

    impl HostStack for ReentrantStack {
        type Handle = u8;

        fn enable(&self) -> Result<(), StackError> {
            Ok(())
        }
        fn start_advertising(&self, _: &AdvertisingDescriptor) -> Result<(), StackError> {
            let n = self.starts.get() + 1;
            self.starts.set(n);
            if self.stop_on_start.get() == Some(n) {
                if let Some(ctrl) = self.controller.get() {
                    ctrl.stop().unwrap();
                }
            }
            // The radio comes up after the stop request was handled.
            self.broadcasting.set(true);
            Ok(())
        }
        fn stop_advertising(&self) -> Result<(), StackError> {
            if self.fail_stop.get() {
                return Err(StackError::Raw(8));
            }
            self.stops.set(self.stops.get() + 1);
            self.broadcasting.set(false);
            Ok(())
        }
        fn register_connection_callbacks(&self, _: &'static dyn ConnectionEventSink<u8>) {}
        fn acquire(&self, handle: &u8) -> u8 {
            *handle
        }
        fn release(&self, _: u8) {}
        fn notify(&self, _: &u8, _: &[u8]) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    fn controller() -> (
        &'static ReentrantStack,
        &'static AdvertisingController<'static, ReentrantStack>,
    ) {
        let stack: &'static ReentrantStack = Box::leak(Box::new(ReentrantStack::default()));
        let ctrl: &'static AdvertisingController<'static, ReentrantStack> = Box::leak(Box::new(
            AdvertisingController::new(stack, &HEART_RATE_ADVERTISING),
        ));
        stack.controller.set(Some(ctrl));
        (stack, ctrl)
    }

    #[test]
    fn restart_resumes_paused_advertising() {
        let (stack, ctrl) = controller();
        ctrl.start().unwrap();
        ctrl.on_connection_accepted();
        assert_eq!(ctrl.state(), AdvertisingState::Paused);

        ctrl.restart_after_disconnect().unwrap();
        assert_eq!(ctrl.state(), AdvertisingState::Advertising);
        assert_eq!(stack.starts.get(), 2);
        assert!(stack.broadcasting.get());
    }

    #[test]
    fn stop_during_restart_is_not_lost() {
        let (stack, ctrl) = controller();
        ctrl.start().unwrap();
        ctrl.on_connection_accepted();

        // The second start (the restart) is interrupted by stop().
        stack.stop_on_start.set(Some(2));
        ctrl.restart_after_disconnect().unwrap();

        assert_eq!(ctrl.state(), AdvertisingState::Stopped);
        assert!(!stack.broadcasting.get(), "radio left advertising after stop");
        assert_eq!(stack.stops.get(), 2);

        // And it stays stopped across the next disconnect.
        ctrl.restart_after_disconnect().unwrap();
        assert_eq!(stack.starts.get(), 2);
    }

    #[test]
    fn failed_stop_keeps_previous_state() {
        let (stack, ctrl) = controller();
        ctrl.start().unwrap();
        ctrl.on_connection_accepted();

        stack.fail_stop.set(true);
        assert_eq!(ctrl.stop(), Err(StackError::Raw(8)));
        assert_eq!(ctrl.state(), AdvertisingState::Paused);
    }

    #[test]
    fn heart_rate_adv_data_layout() {
        let data = HEART_RATE_ADVERTISING.adv_data().unwrap();
        assert_eq!(data.as_slice(), &[0x02, 0x01, 0x06, 0x03, 0x03, 0x0D, 0x18]);
        assert_eq!(flags(&data), Some(0x06));
        assert!(contains_service_uuid16(&data, HRS_UUID16));
    }

    #[test]
    fn heart_rate_scan_data_carries_name() {
        let data = HEART_RATE_ADVERTISING.scan_data().unwrap();
        let name = extract_device_name(&data).unwrap();
        assert_eq!(name.as_str(), config::DEVICE_NAME);
    }

    #[test]
    fn scan_data_empty_without_use_name() {
        let mut descriptor = AdvertisingDescriptor::heart_rate();
        descriptor.options.use_name = false;
        assert!(descriptor.scan_data().unwrap().is_empty());
    }

    #[test]
    fn oversized_name_is_rejected() {
        let mut descriptor = AdvertisingDescriptor::heart_rate();
        descriptor.name = "A name that is far too long for one legacy PDU";
        assert_eq!(descriptor.scan_data(), Err(StackError::PayloadTooLarge));
    }

    #[test]
    fn interval_bounds_are_ordered() {
        let d = AdvertisingDescriptor::heart_rate();
        assert!(d.interval_min <= d.interval_max);
        assert_eq!(d.interval_min, 0x00A0);
        assert_eq!(d.interval_max, 0x00F0);
    }
}
