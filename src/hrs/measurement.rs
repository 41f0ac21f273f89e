//! Heart Rate Measurement characteristic value (UUID 0x2A37).
//!
//! Layout (2 or 3 bytes):
//! ```text
//! Byte 0: Flags (bitfield)
//!         Bit 0   = Value format (0 = UINT8, 1 = UINT16)
//!         Bit 1-2 = Sensor contact status
//!                   (0b10 = supported, not detected;
//!                    0b11 = supported, detected)
//!         Bit 3   = Energy expended present (never set here)
//!         Bit 4   = RR-interval present (never set here)
//! Byte 1..: Heart rate value, UINT8 or little-endian UINT16
//! ```

/// Largest encoded measurement in bytes.
pub const HRM_MAX_LEN: usize = 3;

const FLAG_VALUE_U16: u8 = 0x01;
const FLAG_CONTACT_SUPPORTED: u8 = 0x04;
const FLAG_CONTACT_DETECTED: u8 = 0x02;

/// Sensor contact state reported alongside the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorContact {
    /// The sensor does not report contact (bits 1-2 = 0b00).
    Unsupported,
    /// Contact supported but the sensor is not on skin.
    NotDetected,
    /// Contact supported and detected.
    Detected,
}

/// A single heart-rate sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeartRateMeasurement {
    /// Beats per minute.
    pub bpm: u16,
    pub contact: SensorContact,
}

impl HeartRateMeasurement {
    /// A sample with sensor contact detected.
    pub const fn new(bpm: u16) -> Self {
        Self {
            bpm,
            contact: SensorContact::Detected,
        }
    }

    /// Flags byte for this sample.
    pub fn flags(&self) -> u8 {
        let mut flags = match self.contact {
            SensorContact::Unsupported => 0,
            SensorContact::NotDetected => FLAG_CONTACT_SUPPORTED,
            SensorContact::Detected => FLAG_CONTACT_SUPPORTED | FLAG_CONTACT_DETECTED,
        };
        if self.bpm > u8::MAX as u16 {
            flags |= FLAG_VALUE_U16;
        }
        flags
    }

    /// Encoded length in bytes.
    pub fn encoded_len(&self) -> usize {
        if self.bpm > u8::MAX as u16 {
            3
        } else {
            2
        }
    }

    /// Serialize into `buf`.  Returns bytes written, or 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        let len = self.encoded_len();
        if buf.len() < len {
            return 0;
        }

        buf[0] = self.flags();
        if len == 3 {
            buf[1..3].copy_from_slice(&self.bpm.to_le_bytes());
        } else {
            buf[1] = self.bpm as u8;
        }
        len
    }

    /// Parse a notification value as a central would see it.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let flags = *data.first()?;
        let bpm = if flags & FLAG_VALUE_U16 != 0 {
            u16::from_le_bytes([*data.get(1)?, *data.get(2)?])
        } else {
            *data.get(1)? as u16
        };
        let contact = match flags & (FLAG_CONTACT_SUPPORTED | FLAG_CONTACT_DETECTED) {
            0x06 => SensorContact::Detected,
            0x04 => SensorContact::NotDetected,
            _ => SensorContact::Unsupported,
        };
        Some(Self { bpm, contact })
    }
}
