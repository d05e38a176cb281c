//! Structured error type for the scheduler.
//!
//! The plain registration calls ([`Kernel::register`], [`Kernel::bind`]) keep
//! the fail-silent behaviour of the lab firmware and only log these errors.
//! The `try_*` variants hand them back to the caller for products that want
//! feedback.
//!
//! [`Kernel::register`]: crate::kernel::Kernel::register
//! [`Kernel::bind`]: crate::kernel::Kernel::bind

use thiserror::Error;

/// Reasons a registration-phase operation can be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedError {
    /// The task table already holds `capacity` tasks.
    #[error("task table full ({capacity} tasks)")]
    CapacityExceeded { capacity: usize },

    /// A task interval of zero ticks would never count down.
    #[error("task interval must be at least one tick")]
    ZeroInterval,

    /// The run loop has started; the table is frozen.
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// Harmonic slot index past the last slot.
    #[error("slot {slot} does not exist")]
    SlotOutOfRange { slot: usize },
}
