//! # Kernel
//!
//! Ties a scheduler to its tick source and to the idle loop.
//!
//! The kernel owns the scheduler and is meant to live in a `static` so the
//! tick interrupt can reach it. Nothing else is global: the application
//! creates the kernel, registers tasks through it, and hands it to its
//! timer ISR.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► KERNEL.initialize(&mut timer) ← Clear table, start 1 ms tick
//!         ├─► KERNEL.register(task, ms)     ← Register tasks (×N)
//!         └─► KERNEL.run(idle)              ← Freeze table (no return)
//!               ├─► Enable interrupts
//!               └─► loop { wait_for_tick() }
//!
//! SysTick / timer ISR
//!   └─► KERNEL.service_shared(&TIMER)
//!         ├─► on_tick() → one dispatch pass
//!         └─► acknowledge()
//! ```
//!
//! ## Shared State
//!
//! Registration is main-line code that runs before interrupts are enabled;
//! the dispatch pass runs in the tick handler afterwards. The running flag
//! enforces that order: registration calls are refused once `run` (or
//! `start`) has been called, and ticks are ignored until then.

use core::cell::RefCell;

use portable_atomic::{AtomicBool, Ordering};

use crate::config::TICK_HZ;
use crate::error::SchedError;
use crate::harmonic::HarmonicScheduler;
use crate::scheduler::{Dispatch, Scheduler, SchedulerStats};
use crate::sync::{self, DispatchGate, Mutex};
use crate::task::{TaskFn, TaskId};
use crate::timer::TickTimer;

// ---------------------------------------------------------------------------
// Idle
// ---------------------------------------------------------------------------

/// Low-power wait used by the run loop.
pub trait Idle {
    /// Unmask the tick interrupt. Called once, right before the loop starts.
    fn enable_interrupts(&mut self);

    /// Suspend until the next interrupt has been handled.
    ///
    /// Only hardware (or, on the host, the tick thread) can end the wait.
    fn wait_for_tick(&mut self);
}

/// Counters observable from outside the dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KernelStats {
    /// Ticks that ran a dispatch pass.
    pub delivered_ticks: u32,
    /// Ticks dropped because the previous pass was still running.
    pub lost_ticks: u32,
    /// Counters from the scheduler itself, `None` when read mid-pass.
    pub scheduler: Option<SchedulerStats>,
}

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

/// A scheduler together with the state needed to drive it from an ISR.
pub struct Kernel<S> {
    scheduler: Mutex<RefCell<S>>,
    gate: DispatchGate,
    running: AtomicBool,
}

impl<S> Kernel<S> {
    /// Wrap `scheduler`. Usable in a `static` initializer.
    pub const fn new(scheduler: S) -> Self {
        Self {
            scheduler: Mutex::new(RefCell::new(scheduler)),
            gate: DispatchGate::new(),
            running: AtomicBool::new(false),
        }
    }

    /// `true` once the run loop has started. The table is frozen from then on.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ticks dropped so far. Safe to call from a task body.
    pub fn lost_ticks(&self) -> u32 {
        self.gate.lost()
    }
}

impl<S: Dispatch> Kernel<S> {
    /// Empty the scheduler and start the tick timer at [`TICK_HZ`].
    ///
    /// May be repeated during the registration phase; each call starts over
    /// with an empty table.
    ///
    /// # Errors
    /// [`SchedError::AlreadyRunning`] after `run` has been entered.
    pub fn initialize<T: TickTimer>(&self, timer: &mut T) -> Result<(), SchedError> {
        self.setup(|scheduler| scheduler.reset())?;
        self.gate.clear_counts();
        timer.configure(TICK_HZ);
        info!("scheduler initialized, {} Hz tick", TICK_HZ);
        Ok(())
    }

    /// Run `f` against the scheduler during the registration phase.
    ///
    /// # Errors
    /// [`SchedError::AlreadyRunning`] after `run` has been entered; `f` is
    /// not called.
    pub fn setup<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, SchedError> {
        sync::critical_section(|cs| {
            if self.is_running() {
                return Err(SchedError::AlreadyRunning);
            }
            Ok(f(&mut *self.scheduler.borrow_ref_mut(cs)))
        })
    }

    /// Read-only access to the scheduler.
    ///
    /// Returns `None` without calling `f` while a dispatch pass holds the
    /// scheduler, i.e. when called from inside a task body.
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        sync::critical_section(|cs| {
            let scheduler = self.scheduler.borrow(cs).try_borrow().ok()?;
            Some(f(&*scheduler))
        })
    }

    /// Tick entry point, called from the timer interrupt.
    ///
    /// Runs one dispatch pass and returns `true`. Returns `false` without
    /// touching the scheduler if the run loop has not started yet, or if the
    /// previous pass is still running, in which case the tick is lost.
    pub fn on_tick(&self) -> bool {
        if !self.is_running() {
            return false;
        }

        let Some(_guard) = self.gate.enter() else {
            trace!("tick lost, dispatch still running");
            return false;
        };

        sync::critical_section(|cs| self.scheduler.borrow_ref_mut(cs).dispatch());
        true
    }

    /// Full compare-match handler: dispatch, then clear the pending flag.
    pub fn service<T: TickTimer>(&self, timer: &mut T) {
        self.on_tick();
        timer.acknowledge();
    }

    /// [`service`](Self::service) for a timer parked in a `static` so the
    /// ISR can reach it. Until a timer is parked the tick is still
    /// dispatched, there is just nothing to acknowledge.
    pub fn service_shared<T: TickTimer>(&self, timer: &Mutex<RefCell<Option<T>>>) {
        sync::critical_section(|cs| match timer.borrow_ref_mut(cs).as_mut() {
            Some(timer) => self.service(timer),
            None => {
                self.on_tick();
            }
        })
    }

    /// Freeze the table and unmask the tick interrupt.
    ///
    /// [`run`](Self::run) calls this before entering its loop. Exposed so a
    /// simulation can drive ticks by hand afterwards.
    pub fn start<I: Idle>(&self, idle: &mut I) {
        let first = sync::critical_section(|_| !self.running.swap(true, Ordering::AcqRel));
        if first {
            info!("scheduler running");
        }
        idle.enable_interrupts();
    }

    /// Enter the low-power run loop. **Does not return.**
    ///
    /// Every wake-up is caused by an interrupt; the dispatch pass itself
    /// happens in the tick handler.
    pub fn run<I: Idle>(&self, mut idle: I) -> ! {
        self.start(&mut idle);
        loop {
            idle.wait_for_tick();
        }
    }

    /// Snapshot of the kernel and scheduler counters.
    ///
    /// Safe to call from a task body; the scheduler counters are left out
    /// there since the pass is still updating them.
    pub fn stats(&self) -> KernelStats {
        KernelStats {
            delivered_ticks: self.gate.delivered(),
            lost_ticks: self.gate.lost(),
            scheduler: self.with_scheduler(|s| s.stats()),
        }
    }
}

impl<const N: usize> Kernel<Scheduler<N>> {
    /// Add a periodic task. Full tables, zero intervals and calls made after
    /// `run` are dropped without notice.
    pub fn register(&self, callback: TaskFn, interval_ms: u32) {
        if let Err(err) = self.try_register(callback, interval_ms) {
            warn!("task dropped: {}", err);
        }
    }

    /// Add a periodic task, reporting why it was refused.
    ///
    /// # Errors
    /// [`SchedError::AlreadyRunning`], [`SchedError::ZeroInterval`] or
    /// [`SchedError::CapacityExceeded`].
    pub fn try_register(
        &self,
        callback: TaskFn,
        interval_ms: u32,
    ) -> Result<TaskId, SchedError> {
        self.setup(|scheduler| scheduler.try_register(callback, interval_ms))?
    }
}

impl Kernel<HarmonicScheduler> {
    /// Bind a callback to a harmonic slot, dropping invalid requests.
    pub fn bind(&self, slot: usize, callback: TaskFn) {
        if let Err(err) = self.try_bind(slot, callback) {
            warn!("binding dropped: {}", err);
        }
    }

    /// Bind a callback to a harmonic slot.
    ///
    /// # Errors
    /// [`SchedError::AlreadyRunning`] or [`SchedError::SlotOutOfRange`].
    pub fn try_bind(&self, slot: usize, callback: TaskFn) -> Result<(), SchedError> {
        self.setup(|scheduler| scheduler.try_bind(slot, callback))?
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::MockTimer;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering as StdOrdering};

    /// Idle that never sleeps; ticks are delivered by the test body.
    #[derive(Default)]
    struct NoIdle {
        enabled: bool,
    }

    impl Idle for NoIdle {
        fn enable_interrupts(&mut self) {
            self.enabled = true;
        }

        fn wait_for_tick(&mut self) {}
    }

    fn noop() {}

    #[test]
    fn test_initialize_configures_one_millisecond_tick() {
        let kernel: Kernel<Scheduler> = Kernel::new(Scheduler::new());
        let mut timer = MockTimer::with_clock(1_000_000);

        kernel.register(noop, 10);
        kernel.initialize(&mut timer).unwrap();

        assert_eq!(timer.tick_hz, Some(1000));
        assert_eq!(timer.reload, Some(999));
        // Table cleared
        assert_eq!(kernel.with_scheduler(|s| s.len()), Some(0));
    }

    #[test]
    fn test_ticks_ignored_before_run() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn hit() {
            HITS.fetch_add(1, StdOrdering::SeqCst);
        }

        let kernel: Kernel<Scheduler> = Kernel::new(Scheduler::new());
        kernel.register(hit, 1);

        assert!(!kernel.on_tick());
        assert_eq!(HITS.load(StdOrdering::SeqCst), 0);
        let stats = kernel.stats();
        assert_eq!((stats.delivered_ticks, stats.lost_ticks), (0, 0));
        assert_eq!(stats.scheduler, Some(SchedulerStats::default()));

        let mut idle = NoIdle::default();
        kernel.start(&mut idle);
        assert!(idle.enabled);
        assert!(kernel.on_tick());
        assert_eq!(HITS.load(StdOrdering::SeqCst), 1);
    }

    #[test]
    fn test_registration_refused_after_start() {
        let kernel: Kernel<Scheduler> = Kernel::new(Scheduler::new());
        let mut timer = MockTimer::new();
        kernel.initialize(&mut timer).unwrap();
        kernel.register(noop, 1);
        kernel.start(&mut NoIdle::default());

        assert_eq!(kernel.try_register(noop, 1), Err(SchedError::AlreadyRunning));
        kernel.register(noop, 1);
        assert_eq!(kernel.with_scheduler(|s| s.len()), Some(1));

        assert_eq!(kernel.initialize(&mut timer), Err(SchedError::AlreadyRunning));
        assert_eq!(timer.configurations, 1);
    }

    #[test]
    fn test_try_register_reports_capacity() {
        let kernel: Kernel<Scheduler<1>> = Kernel::new(Scheduler::new());
        assert_eq!(kernel.try_register(noop, 5).map(|id| id.index()), Ok(0));
        assert_eq!(
            kernel.try_register(noop, 5),
            Err(SchedError::CapacityExceeded { capacity: 1 })
        );
    }

    #[test]
    fn test_overrun_loses_exactly_one_tick() {
        static KERNEL: Kernel<Scheduler<2>> = Kernel::new(Scheduler::new());
        static SLOW: AtomicUsize = AtomicUsize::new(0);
        static FAST: AtomicUsize = AtomicUsize::new(0);

        fn slow() {
            SLOW.fetch_add(1, StdOrdering::SeqCst);
            // The next compare-match fires while this body is still running
            assert!(!KERNEL.on_tick());
        }
        fn fast() {
            FAST.fetch_add(1, StdOrdering::SeqCst);
        }

        KERNEL.register(slow, 5);
        KERNEL.register(fast, 1);
        KERNEL.start(&mut NoIdle::default());

        for _ in 0..20 {
            assert!(KERNEL.on_tick());
        }

        let stats = KERNEL.stats();
        assert_eq!(SLOW.load(StdOrdering::SeqCst), 4);
        assert_eq!(stats.lost_ticks, 4);
        assert_eq!(stats.delivered_ticks, 20);
        // Lost ticks are not replayed
        assert_eq!(stats.scheduler.map(|s| s.ticks), Some(20));
        assert_eq!(FAST.load(StdOrdering::SeqCst), 20);
    }

    #[test]
    fn test_service_acknowledges_every_compare_match() {
        let kernel: Kernel<Scheduler> = Kernel::new(Scheduler::new());
        let mut timer = MockTimer::new();

        // Before start: nothing dispatched, flag still cleared
        kernel.service(&mut timer);
        kernel.start(&mut NoIdle::default());
        kernel.service(&mut timer);
        kernel.service(&mut timer);

        assert_eq!(timer.acknowledged, 3);
        assert_eq!(kernel.stats().delivered_ticks, 2);
    }

    #[test]
    fn test_service_shared_acknowledges_parked_timer() {
        static TIMER: Mutex<RefCell<Option<MockTimer>>> = Mutex::new(RefCell::new(None));

        let kernel: Kernel<Scheduler> = Kernel::new(Scheduler::new());
        let mut timer = MockTimer::new();
        kernel.initialize(&mut timer).unwrap();
        kernel.start(&mut NoIdle::default());

        // Tick before the timer is parked: dispatched, nothing to clear
        kernel.service_shared(&TIMER);
        sync::critical_section(|cs| TIMER.borrow(cs).replace(Some(timer)));
        kernel.service_shared(&TIMER);
        kernel.service_shared(&TIMER);

        assert_eq!(kernel.stats().delivered_ticks, 3);
        let acknowledged = sync::critical_section(|cs| {
            TIMER.borrow_ref(cs).as_ref().map(|t| t.acknowledged)
        });
        assert_eq!(acknowledged, Some(2));
    }

    #[test]
    fn test_stats_readable_from_task_body() {
        static KERNEL: Kernel<Scheduler<1>> = Kernel::new(Scheduler::new());
        static SEEN: std::sync::Mutex<Vec<KernelStats>> = std::sync::Mutex::new(Vec::new());

        fn report() {
            SEEN.lock().unwrap().push(KERNEL.stats());
            assert_eq!(KERNEL.with_scheduler(|s| s.len()), None);
        }

        KERNEL.register(report, 2);
        KERNEL.start(&mut NoIdle::default());
        for _ in 0..4 {
            assert!(KERNEL.on_tick());
        }

        let seen = SEEN.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].delivered_ticks, 2);
        assert_eq!(seen[1].delivered_ticks, 4);
        assert!(seen.iter().all(|s| s.scheduler.is_none()));

        // Outside the pass the scheduler counters are back
        let stats = KERNEL.stats();
        assert_eq!(stats.scheduler.map(|s| s.invocations), Some(2));
        assert_eq!(KERNEL.with_scheduler(|s| s.len()), Some(1));
    }

    #[test]
    fn test_run_dispatches_on_each_wakeup() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn hit() {
            HITS.fetch_add(1, StdOrdering::SeqCst);
        }

        /// Idle whose "interrupt" delivers a tick on every wait, and which
        /// bails out after a fixed number of wake-ups.
        struct TickingIdle<'a> {
            kernel: &'a Kernel<Scheduler>,
            wakeups: usize,
        }

        impl Idle for TickingIdle<'_> {
            fn enable_interrupts(&mut self) {}

            fn wait_for_tick(&mut self) {
                if self.wakeups == 9 {
                    panic!("stop");
                }
                self.wakeups += 1;
                self.kernel.on_tick();
            }
        }

        let kernel: Kernel<Scheduler> = Kernel::new(Scheduler::new());
        kernel.register(hit, 3);

        let idle = TickingIdle { kernel: &kernel, wakeups: 0 };
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            kernel.run(idle);
        }));

        assert!(result.is_err());
        assert!(kernel.is_running());
        assert_eq!(HITS.load(StdOrdering::SeqCst), 3);
    }

    #[test]
    fn test_harmonic_kernel() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn hit() {
            HITS.fetch_add(1, StdOrdering::SeqCst);
        }

        let kernel = Kernel::new(HarmonicScheduler::new());
        kernel.bind(1, hit);
        assert_eq!(
            kernel.try_bind(12, hit),
            Err(SchedError::SlotOutOfRange { slot: 12 })
        );
        kernel.start(&mut NoIdle::default());
        assert_eq!(kernel.try_bind(2, hit), Err(SchedError::AlreadyRunning));

        for _ in 0..10 {
            kernel.on_tick();
        }
        assert_eq!(HITS.load(StdOrdering::SeqCst), 5);
    }
}
