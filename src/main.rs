//! # cosched Example Firmware
//!
//! The five-task layout of a small data-logger front panel:
//!
//! | Task | Interval | Behavior |
//! |------|----------|----------|
//! | `led_blink_task` | 200 ms | Toggles the heartbeat LED |
//! | `clock_task` | 1000 ms | Advances the hh:mm:ss clock |
//! | `adc_sample_task` | 300 ms | Takes a new ADC reading |
//! | `voltage_task` | 500 ms | Converts the last reading to millivolts |
//! | `user_input_task` | 350 ms | Polls the buttons |
//!
//! Task bodies only touch atomics here; on a board they would call the GPIO,
//! ADC and display drivers.
//!
//! Build with `--target thumbv7em-none-eabihf --features rt`.

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use cortex_m_rt::{entry, exception};
use panic_halt as _;

use cosched::arch::cortex_m4::{self, SharedSysTick, SysTickTimer, WfiIdle};
use cosched::sync::{self, Mutex};
use cosched::{Kernel, Scheduler};

static KERNEL: Kernel<Scheduler> = Kernel::new(Scheduler::new());
static TIMER: SharedSysTick = Mutex::new(RefCell::new(None));

static LED_ON: AtomicBool = AtomicBool::new(false);
static SECONDS_OF_DAY: AtomicU32 = AtomicU32::new(0);
static ADC_RAW: AtomicU32 = AtomicU32::new(0);
static MILLIVOLTS: AtomicU32 = AtomicU32::new(0);
static BUTTON_PRESSES: AtomicU32 = AtomicU32::new(0);

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;
const ADC_FULL_SCALE: u32 = 1023;
const VREF_MV: u32 = 3300;

// ---------------------------------------------------------------------------
// Task bodies
// ---------------------------------------------------------------------------

fn led_blink_task() {
    LED_ON.fetch_xor(true, Ordering::Relaxed);
}

fn clock_task() {
    let next = (SECONDS_OF_DAY.load(Ordering::Relaxed) + 1) % SECONDS_PER_DAY;
    SECONDS_OF_DAY.store(next, Ordering::Relaxed);
}

fn adc_sample_task() {
    // Stand-in for a conversion: a slow ramp across the 10-bit range
    let next = (ADC_RAW.load(Ordering::Relaxed) + 7) % (ADC_FULL_SCALE + 1);
    ADC_RAW.store(next, Ordering::Relaxed);
}

fn voltage_task() {
    let raw = ADC_RAW.load(Ordering::Relaxed);
    MILLIVOLTS.store(raw * VREF_MV / ADC_FULL_SCALE, Ordering::Relaxed);
}

fn user_input_task() {
    // Button state would be read from GPIO here
    if LED_ON.load(Ordering::Relaxed) && SECONDS_OF_DAY.load(Ordering::Relaxed) % 10 == 0 {
        BUTTON_PRESSES.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Interrupts
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    cortex_m4::systick_isr(&KERNEL, &TIMER);
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Firmware entry point. Starts the 1 ms tick, registers the tasks and
/// enters the sleep loop. Does not return.
#[entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().unwrap();
    cortex_m4::set_tick_priority(&mut cp.SCB);

    let mut timer = SysTickTimer::new(cp.SYST);
    // Only fails once running, and the loop has not been entered yet
    KERNEL.initialize(&mut timer).ok();
    sync::critical_section(|cs| {
        TIMER.borrow(cs).replace(Some(timer));
    });

    KERNEL.register(led_blink_task, 200);
    KERNEL.register(clock_task, 1000);
    KERNEL.register(adc_sample_task, 300);
    KERNEL.register(voltage_task, 500);
    KERNEL.register(user_input_task, 350);

    KERNEL.run(WfiIdle)
}
