//! # Architecture Ports
//!
//! Tick timer and idle implementations per target. The Cortex-M port
//! drives the kernel from SysTick and sleeps with `wfi`; the host port
//! stands in for both with a thread and a condition variable.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;

#[cfg(any(test, feature = "std"))]
pub mod host;
