//! Heart Rate Service (0x180D) values and measurement sources.
//!
//! The GATT table itself is declared by the SoftDevice adapter; this module
//! holds the parts that do not depend on the stack: the measurement wire
//! format, the body sensor location and the source the scheduler samples.

pub mod measurement;


pub use measurement::{HeartRateMeasurement, SensorContact, HRM_MAX_LEN};

/// 16-bit UUID of the Heart Rate Service.
pub const HRS_UUID16: u16 = 0x180D;

/// 16-bit UUID of the Heart Rate Measurement characteristic.
pub const HRM_UUID16: u16 = 0x2A37;

/// 16-bit UUID of the Body Sensor Location characteristic.
pub const BODY_SENSOR_LOCATION_UUID16: u16 = 0x2A38;

/// Body Sensor Location characteristic values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BodySensorLocation {
    Other = 0x00,
    Chest = 0x01,
    Wrist = 0x02,
    Finger = 0x03,
    Hand = 0x04,
    EarLobe = 0x05,
    Foot = 0x06,
}

impl From<u8> for BodySensorLocation {
    fn from(v: u8) -> Self {
        match v {
            0x01 => Self::Chest,
            0x02 => Self::Wrist,
            0x03 => Self::Finger,
            0x04 => Self::Hand,
            0x05 => Self::EarLobe,
            0x06 => Self::Foot,
            _ => Self::Other,
        }
    }
}

/// Produces one heart-rate sample per scheduler period.
///
/// A real sensor driver implements this in place of [`FixedHeartRate`].
pub trait MeasurementSource {
    fn produce(&mut self) -> HeartRateMeasurement;
}

/// Simulated sensor that always reports the same value.
#[derive(Clone, Copy, Debug)]
pub struct FixedHeartRate {
    bpm: u16,
}

impl FixedHeartRate {
    pub const fn new(bpm: u16) -> Self {
        Self { bpm }
    }
}

impl Default for FixedHeartRate {
    fn default() -> Self {
        Self::new(crate::config::SIMULATED_BPM)
    }
}

impl MeasurementSource for FixedHeartRate {
    fn produce(&mut self) -> HeartRateMeasurement {
        HeartRateMeasurement::new(self.bpm)
    }
}
