//! # Harmonic Scheduler
//!
//! Global-tick variant of the scheduler. Instead of a task table with
//! per-task countdowns there is a single wrapping tick counter and a fixed
//! set of slots, where slot `k` runs every `2^k` ticks:
//!
//! | Slot | Period (ticks) | Mask |
//! |------|----------------|------|
//! | 0    | 1              | 0x000 |
//! | 1    | 2              | 0x001 |
//! | 2    | 4              | 0x003 |
//! | …    | …              | …     |
//! | 11   | 2048           | 0x7FF |
//!
//! On each tick the counter is advanced first (wrapping at
//! [`GLOBAL_TICK_CEILING`]) and then every bound slot whose mask clears the
//! counter is run, lowest slot first. Since the ceiling is a multiple of
//! every period, wrapping never misaligns a slot. Unbound slots are skipped.

use crate::config::{GLOBAL_TICK_CEILING, SLOT_COUNT};
use crate::error::SchedError;
use crate::scheduler::{Dispatch, SchedulerStats};
use crate::task::TaskFn;

/// Period of `slot` in ticks.
#[inline]
pub const fn slot_period(slot: usize) -> u16 {
    1 << slot
}

/// Mask that clears the global counter exactly on multiples of the slot's
/// period.
#[inline]
pub const fn slot_mask(slot: usize) -> u16 {
    slot_period(slot) - 1
}

/// Fixed-slot scheduler driven by one global tick counter.
pub struct HarmonicScheduler {
    slots: [Option<TaskFn>; SLOT_COUNT],
    counter: u16,
    stats: SchedulerStats,
}

impl HarmonicScheduler {
    /// All slots unbound, counter at zero.
    pub const fn new() -> Self {
        Self {
            slots: [None; SLOT_COUNT],
            counter: 0,
            stats: SchedulerStats {
                ticks: 0,
                invocations: 0,
            },
        }
    }

    /// Bind `callback` to `slot`, replacing whatever was bound before.
    ///
    /// # Errors
    /// [`SchedError::SlotOutOfRange`] if `slot >= SLOT_COUNT`.
    pub fn try_bind(&mut self, slot: usize, callback: TaskFn) -> Result<(), SchedError> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(SchedError::SlotOutOfRange { slot })?;
        *entry = Some(callback);
        debug!("slot {} bound, every {} ticks", slot, slot_period(slot));
        Ok(())
    }

    /// Bind `callback` to `slot`, ignoring out-of-range slots.
    pub fn bind(&mut self, slot: usize, callback: TaskFn) {
        if let Err(err) = self.try_bind(slot, callback) {
            warn!("binding dropped: {}", err);
        }
    }

    /// `true` if a callback is bound to `slot`.
    pub fn is_bound(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    /// Current value of the global tick counter.
    pub const fn counter(&self) -> u16 {
        self.counter
    }

    fn advance(&mut self) {
        self.counter += 1;
        if self.counter >= GLOBAL_TICK_CEILING {
            self.counter = 0;
        }
    }
}

impl Default for HarmonicScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatch for HarmonicScheduler {
    fn dispatch(&mut self) {
        self.advance();
        self.stats.ticks = self.stats.ticks.wrapping_add(1);

        let counter = self.counter;
        for (slot, callback) in self.slots.iter().enumerate() {
            if counter & slot_mask(slot) != 0 {
                continue;
            }
            if let Some(callback) = callback {
                callback();
                self.stats.invocations = self.stats.invocations.wrapping_add(1);
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
