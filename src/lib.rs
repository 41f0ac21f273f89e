//! Heart-rate peripheral core for kinpathic-hrm.
//!
//! Everything that decides *what* the device does lives here and is
//! independent of the radio: the advertising controller, the single-slot
//! connection registry, the event dispatcher, the notification scheduler
//! and the Heart Rate Service encoding.  The embedded binary (`main.rs`)
//! supplies the SoftDevice-backed [`ble::HostStack`] and the executor tasks.
//!
//! Usage: `cargo test --lib` runs the host tests; the firmware builds with
//! `--features embedded`.

#![cfg_attr(not(test), no_std)]

// This must go first so the logging macros are visible in every module.
mod fmt;

pub mod app;
pub mod ble;
pub mod config;
pub mod error;
pub mod hrs;
pub mod scheduler;

pub use app::{startup, Startup};
pub use ble::advertising::{AdvertisingController, AdvertisingDescriptor, HEART_RATE_ADVERTISING};
pub use ble::dispatcher::EventDispatcher;
pub use ble::registry::{ConnectionRegistry, ConnectionState};
pub use ble::{ConnectionEventSink, HostStack};
pub use error::Error;
pub use scheduler::{NotificationScheduler, TickOutcome};

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - lifecycle wiring against an in-memory stack
// ═══════════════════════════════════════════════════════════════════════════
