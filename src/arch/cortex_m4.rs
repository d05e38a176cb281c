//! # Cortex-M4 Port Layer
//!
//! SysTick as the tick timer, `wfi` as the low-power wait.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: Priority 0xFF (lowest). An exception never preempts itself,
//!   so while a dispatch pass runs the next SysTick stays pending and is
//!   taken once, after the pass returns. Further compare-matches in that
//!   window are lost.
//!
//! ## Wiring
//!
//! ```ignore
//! static KERNEL: Kernel<Scheduler> = Kernel::new(Scheduler::new());
//! static TIMER: SharedSysTick = Mutex::new(RefCell::new(None));
//!
//! #[exception]
//! fn SysTick() {
//!     cortex_m4::systick_isr(&KERNEL, &TIMER);
//! }
//! ```

use core::cell::RefCell;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::config::SYSTEM_CLOCK_HZ;
use crate::kernel::{Idle, Kernel};
use crate::scheduler::Dispatch;
use crate::sync::Mutex;
use crate::timer::{compare_threshold, TickTimer};

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Where `main` parks the configured timer for the handler.
pub type SharedSysTick = Mutex<RefCell<Option<SysTickTimer>>>;

/// SysTick driven from the processor clock.
pub struct SysTickTimer {
    syst: SYST,
    clock_hz: u32,
}

impl SysTickTimer {
    /// SysTick clocked at [`SYSTEM_CLOCK_HZ`].
    pub fn new(syst: SYST) -> Self {
        Self::with_clock(syst, SYSTEM_CLOCK_HZ)
    }

    /// SysTick clocked at `clock_hz`. Use this after changing the core
    /// clock so the reload value is recomputed.
    pub fn with_clock(syst: SYST, clock_hz: u32) -> Self {
        Self { syst, clock_hz }
    }

    /// Give the peripheral back.
    pub fn free(self) -> SYST {
        self.syst
    }
}

impl TickTimer for SysTickTimer {
    fn configure(&mut self, tick_hz: u32) {
        let reload = compare_threshold(self.clock_hz, tick_hz) - 1;
        self.syst.set_reload(reload);
        self.syst.clear_current();
        self.syst.set_clock_source(SystClkSource::Core);
        self.syst.enable_interrupt();
        self.syst.enable_counter();
        debug!("SysTick reload {}", reload);
    }

    fn acknowledge(&mut self) {
        // Reading CSR clears COUNTFLAG
        let _ = self.syst.has_wrapped();
    }
}

/// Set SysTick to the lowest exception priority so it never delays other
/// interrupt handlers.
pub fn set_tick_priority(scb: &mut SCB) {
    // SAFETY: changing a system handler priority cannot break a
    // priority-based critical section here; the kernel only uses
    // PRIMASK-based critical sections.
    unsafe {
        scb.set_priority(SystemHandler::SysTick, 0xFF);
    }
}

// ---------------------------------------------------------------------------
// SysTick handler body
// ---------------------------------------------------------------------------

/// Body of the `SysTick` exception handler.
///
/// Hands the tick to the kernel, then clears COUNTFLAG through the parked
/// timer. Does no task work of its own.
#[inline]
pub fn systick_isr<S: Dispatch>(kernel: &Kernel<S>, timer: &SharedSysTick) {
    kernel.service_shared(timer);
}

// ---------------------------------------------------------------------------
// Idle
// ---------------------------------------------------------------------------

/// Sleep between ticks with `wfi`.
pub struct WfiIdle;

impl Idle for WfiIdle {
    fn enable_interrupts(&mut self) {
        // SAFETY: registration is complete and the table is frozen before
        // the run loop unmasks interrupts.
        unsafe {
            cortex_m::interrupt::enable();
        }
    }

    fn wait_for_tick(&mut self) {
        cortex_m::asm::wfi();
    }
}
