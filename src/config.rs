//! Application-wide constants and compile-time configuration.
//!
//! Timing parameters, advertising parameters and protocol constants live
//! here so they can be tuned in one place.  There is no runtime
//! configuration and nothing is persisted.

use crate::hrs::BodySensorLocation;

// Identity

/// GAP device name, carried in the scan response.
pub const DEVICE_NAME: &str = "Kinpathic HRM";

// Advertising

/// Advertising interval range (in 0.625 ms units).
/// 0x00A0 = 100 ms, 0x00F0 = 150 ms (the "fast interval 2" pair from the
/// Core Specification's GAP timers).
pub const ADV_INTERVAL_MIN: u16 = 0x00A0;
pub const ADV_INTERVAL_MAX: u16 = 0x00F0;

/// Largest legacy advertising / scan response payload (bytes).
pub const ADV_PAYLOAD_MAX: usize = 31;

// Heart Rate Service

/// Notification period (seconds).
pub const NOTIFY_PERIOD_SECS: u64 = 2;

/// Simulated heart rate reported by the fixed measurement source (bpm).
pub const SIMULATED_BPM: u16 = 72;

/// Body Sensor Location characteristic value.
pub const BODY_SENSOR_LOCATION: BodySensorLocation = BodySensorLocation::Chest;

// SoftDevice

/// Peripheral links supported at once.  One slot: advertising pauses while
/// it is taken.
pub const PERIPHERAL_LINKS: u8 = 1;

/// ATT MTU.  Measurements are at most 3 bytes so the default is plenty.
pub const ATT_MTU: u16 = 23;
