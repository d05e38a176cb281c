//! # Host Port
//!
//! Runs the kernel on a desktop OS for simulation and tests.
//!
//! A background thread plays the timer interrupt: it sleeps one tick period,
//! services the kernel, and wakes the idle loop through a condition
//! variable. It sleeps a full period after every tick, however long the
//! pass took, so late ticks are never made up.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::kernel::{Idle, Kernel};
use crate::scheduler::Dispatch;
use crate::timer::TickTimer;

#[derive(Default)]
struct WakeState {
    enabled: bool,
    stop: bool,
    wakeups: u64,
}

#[derive(Default)]
struct Shared {
    state: Mutex<WakeState>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, WakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create a connected timer/idle pair.
pub fn port() -> (HostTimer, HostIdle) {
    let shared = Arc::new(Shared::default());
    (
        HostTimer {
            shared: Arc::clone(&shared),
            period: None,
            acknowledged: 0,
        },
        HostIdle { shared, seen: 0 },
    )
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Thread-backed [`TickTimer`].
pub struct HostTimer {
    shared: Arc<Shared>,
    period: Option<Duration>,
    acknowledged: u64,
}

impl HostTimer {
    /// Tick period set by the last `configure`.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Compare-matches acknowledged so far.
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    /// Start delivering ticks to `kernel`.
    ///
    /// Ticks only reach the kernel once the paired [`HostIdle`] has enabled
    /// interrupts. Without a prior `configure` the thread ticks every
    /// millisecond.
    pub fn spawn<S>(mut self, kernel: &'static Kernel<S>) -> TickThread
    where
        S: Dispatch + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let period = self.period.unwrap_or(Duration::from_millis(1));

        let handle = thread::spawn(move || {
            loop {
                thread::sleep(period);

                let enabled = {
                    let state = self.shared.lock();
                    if state.stop {
                        break;
                    }
                    state.enabled
                };
                if !enabled {
                    continue;
                }

                kernel.service(&mut self);

                self.shared.lock().wakeups += 1;
                self.shared.wake.notify_all();
            }
            self
        });

        TickThread { shared, handle }
    }
}

impl TickTimer for HostTimer {
    fn configure(&mut self, tick_hz: u32) {
        let period = Duration::from_nanos(1_000_000_000 / u64::from(tick_hz.max(1)));
        self.period = Some(period);
        debug!("host tick period {} us", period.as_micros() as u64);
    }

    fn acknowledge(&mut self) {
        self.acknowledged += 1;
    }
}

/// Handle to the running tick thread.
pub struct TickThread {
    shared: Arc<Shared>,
    handle: JoinHandle<HostTimer>,
}

impl TickThread {
    /// Stop ticking and return the timer.
    pub fn stop(self) -> HostTimer {
        self.shared.lock().stop = true;
        self.shared.wake.notify_all();
        match self.handle.join() {
            Ok(timer) => timer,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

// ---------------------------------------------------------------------------
// Idle
// ---------------------------------------------------------------------------

/// Condvar-backed [`Idle`]: each wait returns after the tick thread has
/// serviced at least one more tick.
pub struct HostIdle {
    shared: Arc<Shared>,
    seen: u64,
}

impl HostIdle {
    /// Wake-ups observed by this idle loop.
    pub fn wakeups(&self) -> u64 {
        self.seen
    }
}

impl Idle for HostIdle {
    fn enable_interrupts(&mut self) {
        self.shared.lock().enabled = true;
    }

    fn wait_for_tick(&mut self) {
        let mut state = self.shared.lock();
        while state.wakeups <= self.seen && !state.stop {
            state = self
                .shared
                .wake
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        self.seen = state.wakeups;
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_configure_sets_period() {
        let (mut timer, _idle) = port();
        timer.configure(1000);
        assert_eq!(timer.period(), Some(Duration::from_millis(1)));
        timer.configure(250);
        assert_eq!(timer.period(), Some(Duration::from_millis(4)));
    }

    #[test]
    fn test_tick_thread_drives_kernel() {
        static KERNEL: Kernel<Scheduler> = Kernel::new(Scheduler::new());
        static EVERY: AtomicUsize = AtomicUsize::new(0);
        static SECOND: AtomicUsize = AtomicUsize::new(0);
        fn every_tick() {
            EVERY.fetch_add(1, Ordering::SeqCst);
        }
        fn every_other() {
            SECOND.fetch_add(1, Ordering::SeqCst);
        }

        let (mut timer, mut idle) = port();
        KERNEL.initialize(&mut timer).unwrap();
        KERNEL.register(every_tick, 1);
        KERNEL.register(every_other, 2);

        let ticker = timer.spawn(&KERNEL);
        KERNEL.start(&mut idle);
        for _ in 0..20 {
            idle.wait_for_tick();
        }
        let timer = ticker.stop();

        let stats = KERNEL.stats();
        let every = EVERY.load(Ordering::SeqCst);
        assert!(idle.wakeups() >= 20);
        assert!(every >= 20);
        assert_eq!(every as u32, stats.delivered_ticks);
        assert_eq!(SECOND.load(Ordering::SeqCst), every / 2);
        assert_eq!(stats.lost_ticks, 0);
        assert_eq!(timer.acknowledged(), u64::from(stats.delivered_ticks));
    }

    #[test]
    fn test_no_ticks_before_interrupts_enabled() {
        static KERNEL: Kernel<Scheduler> = Kernel::new(Scheduler::new());

        let (mut timer, _idle) = port();
        timer.configure(1000);
        let ticker = timer.spawn(&KERNEL);
        thread::sleep(Duration::from_millis(10));
        let timer = ticker.stop();

        assert_eq!(timer.acknowledged(), 0);
        assert_eq!(KERNEL.stats().delivered_ticks, 0);
    }
}
