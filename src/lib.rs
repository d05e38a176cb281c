//! # cosched: Cooperative Tick Scheduler
//!
//! A small cooperative scheduler for microcontrollers: a fixed table of
//! periodic callbacks driven by one timer interrupt, with the processor
//! asleep between ticks.
//!
//! ## Overview
//!
//! Every tick (1 ms by default) the timer interrupt runs one *dispatch
//! pass*. Each registered task counts down; a task that reaches zero runs to
//! completion and is reloaded with its interval. Tasks never preempt one
//! another, and a tick that arrives while a pass is still running is lost
//! rather than queued.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │              Application Task Bodies (fn())             │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   initialize() · register() · run() · on_tick()         │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Task table  │  Harmonic slots    │  Sync Primitives  │
//! │  scheduler.rs│  harmonic.rs       │  sync.rs          │
//! │  ─ register()│  ─ bind()          │  ─ critical_section│
//! │  ─ dispatch()│  ─ dispatch()      │  ─ DispatchGate   │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │            Task Model (task.rs) · Timer (timer.rs)      │
//! ├────────────────────────────────────────────────────────┤
//! │      Ports: arch/cortex_m4.rs (SysTick, wfi)            │
//! │             arch/host.rs (thread, condvar)              │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduler Variants
//!
//! - [`Scheduler`]: ordered table of `(callback, interval)` tasks,
//!   registered at startup. Capacity defaults to
//!   [`config::DEFAULT_CAPACITY`]; registrations past it are dropped.
//! - [`HarmonicScheduler`]: twelve fixed slots with power-of-two periods
//!   selected by masking one global tick counter.
//!
//! ## Memory Model
//!
//! - **No heap**: the task table is a `heapless::Vec`
//! - **No globals in the library**: the application owns the
//!   [`Kernel`] (usually in a `static`) and passes it to its ISR
//! - **Critical sections**: `critical-section` for shared state

#![cfg_attr(not(any(test, feature = "std")), no_std)]

// Must come first so the logging macros are visible to the other modules.
mod fmt;

pub mod arch;
pub mod config;
pub mod error;
pub mod harmonic;
pub mod kernel;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod timer;

pub use error::SchedError;
pub use harmonic::HarmonicScheduler;
pub use kernel::{Idle, Kernel, KernelStats};
pub use scheduler::{Dispatch, Scheduler, SchedulerStats};
pub use task::{Task, TaskFn, TaskId};
pub use timer::{MockTimer, TickTimer};
