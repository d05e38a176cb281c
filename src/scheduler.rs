//! # Scheduler
//!
//! Task-table scheduler: a fixed-capacity, ordered table of periodic tasks
//! that is walked once per tick.
//!
//! ## Dispatch Pass
//!
//! At each tick:
//! 1. **Count down**: every task's counter is decremented by one
//! 2. **Fire**: a task whose counter reached zero runs to completion
//! 3. **Reload**: its counter is reset to its interval
//!
//! Tasks are visited in registration order, so when several are due on the
//! same tick the earlier-registered one runs first and finishes before the
//! next one starts.
//!
//! ## Registration
//!
//! The table is append-only. Once it holds `N` tasks further registrations
//! are dropped; [`Scheduler::register`] stays silent about it, matching the
//! lab firmware, while [`Scheduler::try_register`] reports it.

use heapless::Vec;

use crate::config::DEFAULT_CAPACITY;
use crate::error::SchedError;
use crate::task::{Task, TaskFn, TaskId};

// ---------------------------------------------------------------------------
// Dispatch seam
// ---------------------------------------------------------------------------

/// Something that can be driven by a periodic tick.
///
/// Implemented by both scheduler variants so that the
/// [`Kernel`](crate::kernel::Kernel) and the timer ports do not care which
/// one the application picked.
pub trait Dispatch {
    /// Execute one dispatch pass. Called exactly once per delivered tick.
    fn dispatch(&mut self);

    /// Return to the empty, just-constructed state.
    fn reset(&mut self);

    /// Counters accumulated since the last reset.
    fn stats(&self) -> SchedulerStats;
}

/// Counters maintained by a scheduler across dispatch passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerStats {
    /// Dispatch passes executed.
    pub ticks: u32,
    /// Callbacks invoked, across all tasks.
    pub invocations: u32,
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The task table and its dispatch logic.
///
/// ## Design Notes
///
/// - Tasks are stored inline in a `heapless::Vec` (no heap)
/// - Capacity is the const parameter `N`, defaulting to
///   [`DEFAULT_CAPACITY`]
/// - No interrupt masking happens here; the [`Kernel`](crate::kernel::Kernel)
///   serializes passes and freezes the table once running
pub struct Scheduler<const N: usize = DEFAULT_CAPACITY> {
    tasks: Vec<Task, N>,
    stats: SchedulerStats,
}

impl<const N: usize> Scheduler<N> {
    /// Create an empty scheduler.
    pub const fn new() -> Self {
        Self {
            tasks: Vec::new(),
            stats: SchedulerStats {
                ticks: 0,
                invocations: 0,
            },
        }
    }

    /// Clear the task table and counters.
    pub fn initialize(&mut self) {
        self.tasks.clear();
        self.stats = SchedulerStats::default();
    }

    /// Append a task whose first run is `interval_ms` ticks from now.
    ///
    /// # Errors
    /// - [`SchedError::ZeroInterval`] if `interval_ms` is zero
    /// - [`SchedError::CapacityExceeded`] if the table already holds `N` tasks;
    ///   existing entries are left untouched
    pub fn try_register(
        &mut self,
        callback: TaskFn,
        interval_ms: u32,
    ) -> Result<TaskId, SchedError> {
        if interval_ms == 0 {
            return Err(SchedError::ZeroInterval);
        }

        let id = TaskId(self.tasks.len());
        self.tasks
            .push(Task::new(callback, interval_ms))
            .map_err(|_| SchedError::CapacityExceeded { capacity: N })?;

        debug!("task {} registered, every {} ticks", id.index(), interval_ms);
        Ok(id)
    }

    /// Append a task, silently dropping it if the table is full or the
    /// interval is zero.
    pub fn register(&mut self, callback: TaskFn, interval_ms: u32) {
        if let Err(err) = self.try_register(callback, interval_ms) {
            warn!("task dropped: {}", err);
        }
    }

    /// Run one dispatch pass.
    pub fn dispatch(&mut self) {
        self.stats.ticks = self.stats.ticks.wrapping_add(1);

        for task in self.tasks.iter_mut() {
            if task.tick() {
                task.run();
                self.stats.invocations = self.stats.invocations.wrapping_add(1);
            }
        }
    }

    /// Registered tasks, in registration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Look up a task by identifier.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.index())
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// `true` if no task has been registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// `true` once `N` tasks are registered.
    pub fn is_full(&self) -> bool {
        self.tasks.is_full()
    }

    /// Maximum number of tasks.
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for Scheduler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Dispatch for Scheduler<N> {
    fn dispatch(&mut self) {
        Scheduler::dispatch(self);
    }

    fn reset(&mut self) {
        self.initialize();
    }

    fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
