//! Unified error types for kinpathic-hrm.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (with the `defmt` feature) for efficient
//! on-target logging, and `Display` for host logging.

use core::fmt;

/// Errors that end the bring-up sequence early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The BLE host stack rejected a request.
    Stack(StackError),

    /// Advertising could not be started.
    Advertising(AdvertisingError),
}

/// Errors reported by the BLE host stack capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackError {
    /// Raw error code from the stack (SoftDevice `NRF_ERROR_*`).
    Raw(u32),
    /// The stack has not been enabled yet.
    NotEnabled,
    /// The stack was already enabled; enabling is a one-time operation.
    AlreadyEnabled,
    /// Advertising or scan response data does not fit a legacy PDU.
    PayloadTooLarge,
    /// The GATT server could not register its services.
    ServiceRegistration,
}

/// Advertising controller failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingError {
    /// The stack refused to start advertising; the device is not discoverable.
    Unavailable(StackError),
}

/// Connection registry rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// `connected` callback carried a non-zero HCI error.
    ConnectFailed(u8),
    /// A second connection arrived while the single slot is taken.
    SlotOccupied,
    /// `disconnected` arrived while no connection is held.
    NotConnected,
    /// `disconnected` arrived for a handle other than the held one.
    UnknownHandle,
}

/// Notification dispatch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyError {
    /// The peer has not enabled notifications (CCCD not written).
    NotSubscribed,
    /// The notification queue is full.
    Busy,
    /// The link dropped before the notification was queued.
    Disconnected,
    /// Raw error code from the stack.
    Raw(u32),
}

/// SoftDevice error codes that carry a specific notify meaning.
pub mod nrf {
    pub const NRF_ERROR_INVALID_STATE: u32 = 0x0008;
    pub const NRF_ERROR_RESOURCES: u32 = 0x0013;
    pub const BLE_ERROR_INVALID_CONN_HANDLE: u32 = 0x3002;
    pub const BLE_ERROR_GATTS_SYS_ATTR_MISSING: u32 = 0x3401;
}

impl NotifyError {
    /// Classify a raw stack code returned for a notification.
    pub const fn from_raw(code: u32) -> Self {
        match code {
            // CCCD never written, or system attributes not set yet.
            nrf::NRF_ERROR_INVALID_STATE | nrf::BLE_ERROR_GATTS_SYS_ATTR_MISSING => {
                NotifyError::NotSubscribed
            }
            nrf::NRF_ERROR_RESOURCES => NotifyError::Busy,
            nrf::BLE_ERROR_INVALID_CONN_HANDLE => NotifyError::Disconnected,
            other => NotifyError::Raw(other),
        }
    }
}

// Convenience conversions

impl From<StackError> for Error {
    fn from(e: StackError) -> Self {
        Error::Stack(e)
    }
}

impl From<AdvertisingError> for Error {
    fn from(e: AdvertisingError) -> Self {
        Error::Advertising(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stack(e) => write!(f, "stack: {}", e),
            Error::Advertising(e) => write!(f, "advertising: {}", e),
        }
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::Raw(code) => write!(f, "err {}", code),
            StackError::NotEnabled => f.write_str("stack not enabled"),
            StackError::AlreadyEnabled => f.write_str("stack already enabled"),
            StackError::PayloadTooLarge => f.write_str("advertising payload too large"),
            StackError::ServiceRegistration => f.write_str("GATT service registration failed"),
        }
    }
}

impl fmt::Display for AdvertisingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvertisingError::Unavailable(e) => write!(f, "advertising unavailable ({})", e),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::ConnectFailed(err) => write!(f, "connection failed (err {})", err),
            RegistryError::SlotOccupied => f.write_str("connection slot already taken"),
            RegistryError::NotConnected => f.write_str("no connection held"),
            RegistryError::UnknownHandle => f.write_str("handle does not match held connection"),
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::NotSubscribed => f.write_str("peer not subscribed"),
            NotifyError::Busy => f.write_str("notification queue full"),
            NotifyError::Disconnected => f.write_str("link disconnected"),
            NotifyError::Raw(code) => write!(f, "err {}", code),
        }
    }
}
