//! # cosched Configuration
//!
//! Compile-time constants governing the scheduler and its tick source.
//! All limits are fixed at compile time, with no dynamic allocation.

/// Default number of entries in a task table.
///
/// A [`Scheduler`](crate::scheduler::Scheduler) can be instantiated with a
/// different capacity through its const parameter; this value is only the
/// default. Registrations beyond capacity are dropped.
pub const DEFAULT_CAPACITY: usize = 5;

/// Tick frequency in Hz. One tick is the scheduler's unit of time, so task
/// intervals are expressed in milliseconds at the default of 1000.
pub const TICK_HZ: u32 = 1000;

/// Clock feeding the tick timer, in Hz (STM32F4 16 MHz HSI feeding SysTick).
///
/// Changing the clock source means the compare threshold must be recomputed;
/// see [`timer::compare_threshold`](crate::timer::compare_threshold).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Number of statically named slots in the harmonic (global-tick) variant.
/// Slot `k` runs every `2^k` ticks.
pub const SLOT_COUNT: usize = 12;

/// Wrap point of the global tick counter. Must be a power of two no smaller
/// than the longest slot period so that wrapping never misaligns a slot.
pub const GLOBAL_TICK_CEILING: u16 = 1 << (SLOT_COUNT - 1);

const _: () = assert!(GLOBAL_TICK_CEILING.is_power_of_two());
const _: () = assert!(SYSTEM_CLOCK_HZ % TICK_HZ == 0);
