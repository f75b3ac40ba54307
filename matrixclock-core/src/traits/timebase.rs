//! Monotonic time and cooperative delays

use core::future::Future;

/// Source of uptime and the only way the core suspends
pub trait Timebase {
    /// Milliseconds since boot
    fn now_ms(&self) -> u64;

    /// Suspend for `ms` milliseconds; `0` just yields
    fn delay_ms(&mut self, ms: u32) -> impl Future<Output = ()>;

    /// Whether the debug console has unread input
    fn input_pending(&mut self) -> bool;
}
