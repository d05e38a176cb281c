//! # Tick Timer
//!
//! Boundary between the scheduler and the hardware timer that paces it.
//!
//! A port implements [`TickTimer`] for its timer peripheral; the
//! [`Kernel`](crate::kernel::Kernel) only ever asks it to start ticking at a
//! given rate and to acknowledge a compare-match. The driver never catches
//! up on missed ticks: if the interrupt is held off for longer than a
//! period, the next tick is delivered once and the lost time is not
//! replayed.

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};

/// Number of timer clock cycles in one tick.
///
/// The hardware compare/reload register takes this value minus one, since
/// the counter runs from zero up to and including the register value.
///
/// # Panics
/// If `tick_hz` is zero or faster than the clock.
pub const fn compare_threshold(clock_hz: u32, tick_hz: u32) -> u32 {
    assert!(tick_hz > 0 && tick_hz <= clock_hz);
    clock_hz / tick_hz
}

/// Reload value for the default clock and tick rate.
pub const DEFAULT_RELOAD: u32 = compare_threshold(SYSTEM_CLOCK_HZ, TICK_HZ) - 1;

/// A periodic timer able to raise one interrupt per tick.
pub trait TickTimer {
    /// Program the compare threshold for `tick_hz`, enable the
    /// compare-match interrupt and start counting.
    fn configure(&mut self, tick_hz: u32);

    /// Clear the pending compare-match so the interrupt can fire again.
    fn acknowledge(&mut self);
}

// ---------------------------------------------------------------------------
// Mock timer
// ---------------------------------------------------------------------------

/// In-memory [`TickTimer`] for tests and simulations.
///
/// Records what it was asked to do. Ticks are delivered by calling
/// [`Kernel::on_tick`](crate::kernel::Kernel::on_tick) directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTimer {
    /// Clock the threshold is computed against.
    pub clock_hz: u32,
    /// Last programmed reload value, `None` until configured.
    pub reload: Option<u32>,
    /// Tick rate of the last `configure` call.
    pub tick_hz: Option<u32>,
    /// Number of `configure` calls.
    pub configurations: u32,
    /// Number of acknowledged compare-matches.
    pub acknowledged: u32,
}

impl MockTimer {
    /// Mock running from the default system clock.
    pub const fn new() -> Self {
        Self::with_clock(SYSTEM_CLOCK_HZ)
    }

    /// Mock running from an arbitrary clock.
    pub const fn with_clock(clock_hz: u32) -> Self {
        Self {
            clock_hz,
            reload: None,
            tick_hz: None,
            configurations: 0,
            acknowledged: 0,
        }
    }

    /// `true` once `configure` has been called.
    pub fn is_running(&self) -> bool {
        self.tick_hz.is_some()
    }
}

impl Default for MockTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TickTimer for MockTimer {
    fn configure(&mut self, tick_hz: u32) {
        self.reload = Some(compare_threshold(self.clock_hz, tick_hz) - 1);
        self.tick_hz = Some(tick_hz);
        self.configurations += 1;
    }

    fn acknowledge(&mut self) {
        self.acknowledged += 1;
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_for_one_megahertz_clock() {
        // 1 MHz SMCLK, 1 ms tick: count to 1000, register holds 999
        assert_eq!(compare_threshold(1_000_000, 1000), 1000);
    }

    #[test]
    fn test_default_reload() {
        assert_eq!(DEFAULT_RELOAD, 15_999);
    }

    #[test]
    fn test_mock_records_configuration() {
        let mut timer = MockTimer::with_clock(1_000_000);
        assert!(!timer.is_running());

        timer.configure(TICK_HZ);
        assert!(timer.is_running());
        assert_eq!(timer.reload, Some(999));
        assert_eq!(timer.tick_hz, Some(1000));
        assert_eq!(timer.configurations, 1);

        timer.acknowledge();
        timer.acknowledge();
        assert_eq!(timer.acknowledged, 2);
    }

    #[test]
    #[should_panic]
    fn test_zero_tick_rate_panics() {
        let _ = compare_threshold(1_000_000, 0);
    }
}
