//! # Synchronization Primitives
//!
//! Interrupt-safe critical section and the non-reentrant dispatch gate.
//! All shared scheduler state is accessed within a critical section to
//! prevent data races between the main thread and the tick handler.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

pub use ::critical_section::{CriticalSection, Mutex};

/// Execute a closure within a critical section (interrupts disabled).
///
/// On Cortex-M this is backed by cortex-m's single-core implementation;
/// the host port and the test build use the `std` implementation of
/// `critical-section`. Nesting is allowed.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|cs| {
///     // Access shared state safely
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    ::critical_section::with(f)
}

// ---------------------------------------------------------------------------
// Dispatch gate
// ---------------------------------------------------------------------------

/// "Dispatch in progress" flag checked by the tick source.
///
/// A tick that arrives while a pass is still running is counted as lost
/// and dropped. It is never queued or replayed, so two passes can never
/// overlap and late ticks do not pile up.
pub struct DispatchGate {
    busy: AtomicBool,
    delivered: AtomicU32,
    lost: AtomicU32,
}

impl DispatchGate {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            delivered: AtomicU32::new(0),
            lost: AtomicU32::new(0),
        }
    }

    /// Claim the gate for one pass.
    ///
    /// Returns `None`, and records a lost tick, if a pass is already running.
    /// The gate is released when the returned guard drops.
    pub fn enter(&self) -> Option<GateGuard<'_>> {
        if self.busy.swap(true, Ordering::Acquire) {
            self.lost.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Some(GateGuard { gate: self })
    }

    /// `true` while a pass holds the gate.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    /// Ticks that made it into a pass.
    pub fn delivered(&self) -> u32 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Ticks dropped because a pass was still running.
    pub fn lost(&self) -> u32 {
        self.lost.load(Ordering::Relaxed)
    }

    /// Zero both counters.
    pub fn clear_counts(&self) {
        self.delivered.store(0, Ordering::Relaxed);
        self.lost.store(0, Ordering::Relaxed);
    }
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that the holder owns the dispatch gate.
pub struct GateGuard<'a> {
    gate: &'a DispatchGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
