//! Periodic heart-rate notification producer.
//!
//! Every period the scheduler samples the measurement source and, if a
//! central is connected, notifies the encoded value.  A failed notification
//! is logged and dropped; the next tick carries a fresh sample, so nothing
//! is queued or retried.
//!
//! The timing loop itself lives with the executor (see the `hrm_task` in
//! the embedded binary); [`NotificationScheduler::tick`] is one period's work.

use crate::ble::registry::ConnectionRegistry;
use crate::ble::HostStack;
use crate::error::NotifyError;
use crate::hrs::{HeartRateMeasurement, MeasurementSource, HRM_MAX_LEN};

/// Result of one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// The measurement was handed to the stack.
    Sent(HeartRateMeasurement),
    /// No connection; nothing was dispatched.
    NotConnected(HeartRateMeasurement),
    /// The stack refused the notification.
    Failed(HeartRateMeasurement, NotifyError),
}

impl TickOutcome {
    pub fn measurement(&self) -> HeartRateMeasurement {
        match *self {
            TickOutcome::Sent(m) | TickOutcome::NotConnected(m) | TickOutcome::Failed(m, _) => m,
        }
    }
}

/// Running counters since boot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerStats {
    pub ticks: u32,
    pub sent: u32,
    pub skipped: u32,
    pub failed: u32,
}

pub struct NotificationScheduler<'a, S: HostStack, M> {
    stack: &'a S,
    registry: &'a ConnectionRegistry<S::Handle>,
    source: M,
    stats: SchedulerStats,
}

impl<'a, S: HostStack, M: MeasurementSource> NotificationScheduler<'a, S, M> {
    pub fn new(stack: &'a S, registry: &'a ConnectionRegistry<S::Handle>, source: M) -> Self {
        Self {
            stack,
            registry,
            source,
            stats: SchedulerStats::default(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Run one period: sample, dispatch if connected, log.
    pub fn tick(&mut self) -> TickOutcome {
        let measurement = self.source.produce();
        self.stats.ticks = self.stats.ticks.wrapping_add(1);

        let outcome = match self.registry.acquire_current(self.stack) {
            None => TickOutcome::NotConnected(measurement),
            Some(conn) => {
                let result = self.dispatch(&conn, &measurement);
                self.stack.release(conn);
                match result {
                    Ok(()) => TickOutcome::Sent(measurement),
                    Err(e) => TickOutcome::Failed(measurement, e),
                }
            }
        };

        match outcome {
            TickOutcome::Sent(_) => {
                self.stats.sent = self.stats.sent.wrapping_add(1);
                info!("Heart Rate: {} bpm", measurement.bpm);
            }
            TickOutcome::NotConnected(_) => {
                self.stats.skipped = self.stats.skipped.wrapping_add(1);
                info!("Heart Rate: {} bpm (no central)", measurement.bpm);
            }
            TickOutcome::Failed(_, e) => {
                self.stats.failed = self.stats.failed.wrapping_add(1);
                warn!("Heart Rate: {} bpm, notify failed ({})", measurement.bpm, e);
            }
        }

        outcome
    }

    fn dispatch(&self, conn: &S::Handle, measurement: &HeartRateMeasurement) -> Result<(), NotifyError> {
        let mut buf = [0u8; HRM_MAX_LEN];
        let len = measurement.serialize(&mut buf);
        self.stack.notify(conn, &buf[..len])
    }
}
