//! # Task
//!
//! A task is one periodic unit of work: a callback plus the interval, in
//! ticks, between invocations. The scheduler keeps a live countdown per task
//! and fires the callback each time the countdown reaches zero.
//!
//! ## Countdown Model
//!
//! ```text
//!   register(cb, 3)     tick        tick        tick
//!   counter = 3   ───►  2     ───►  1     ───►  0 ─► cb() ─► counter = 3
//! ```
//!
//! Outside of [`Task::tick`] the counter always satisfies
//! `0 < counter <= interval`.

/// Task body. Takes nothing, returns nothing, and must finish well inside
/// one tick period.
pub type TaskFn = fn();

// ---------------------------------------------------------------------------
// Task identifier
// ---------------------------------------------------------------------------

/// Position of a task in its scheduler's table.
///
/// Identifiers are handed out in registration order and, since tasks are
/// never removed, stay valid for the lifetime of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Table index of this task.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One entry of the task table.
#[derive(Clone, Copy)]
pub struct Task {
    callback: TaskFn,
    interval: u32,
    counter: u32,
    /// Number of times the callback has been invoked.
    runs: u32,
}

impl Task {
    /// Create a task whose first run is `interval` ticks away.
    ///
    /// Callers validate `interval > 0`; see
    /// [`Scheduler::try_register`](crate::scheduler::Scheduler::try_register).
    pub const fn new(callback: TaskFn, interval: u32) -> Self {
        Self {
            callback,
            interval,
            counter: interval,
            runs: 0,
        }
    }

    /// Advance the countdown by one tick.
    ///
    /// Returns `true` when the task fell due on this tick, in which case the
    /// counter has already been reloaded and the caller must run it.
    #[inline]
    pub fn tick(&mut self) -> bool {
        if self.counter > 0 {
            self.counter -= 1;
        }
        if self.counter == 0 {
            self.counter = self.interval;
            true
        } else {
            false
        }
    }

    /// Invoke the callback synchronously.
    #[inline]
    pub fn run(&mut self) {
        (self.callback)();
        self.runs = self.runs.wrapping_add(1);
    }

    /// Ticks between invocations. Fixed at registration.
    #[inline]
    pub const fn interval(&self) -> u32 {
        self.interval
    }

    /// Ticks left until the next invocation.
    #[inline]
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// How many times the callback has run.
    #[inline]
    pub const fn runs(&self) -> u32 {
        self.runs
    }

    /// The registered callback.
    #[inline]
    pub fn callback(&self) -> TaskFn {
        self.callback
    }
}

impl core::fmt::Debug for Task {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("interval", &self.interval)
            .field("counter", &self.counter)
            .field("runs", &self.runs)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
