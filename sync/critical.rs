//! Critical region guard
//!
//! Multi-step register sequences on shared interrupt-controller and
//! scratchpad state run with interrupts disabled on the current VPE and the
//! other VPEs of the core stopped. [`CriticalRegion`] captures both states on
//! entry and restores them when dropped, on every exit path.
//!
//! Regions nest: an inner region finds interrupts already disabled and
//! leaves them disabled when it ends.

use crate::arch::{Cpu, CpuControl};

/// RAII guard for the interrupt/MVPE critical region
#[must_use = "the critical region ends when the guard is dropped"]
pub struct CriticalRegion {
    /// Saved interrupt enable state
    int_state: u32,
    /// Saved multi-VPE state
    mvpe_state: u32,
}

impl CriticalRegion {
    /// Enter the critical region
    #[inline]
    pub fn enter() -> Self {
        let int_state = Cpu::int_global_disable();
        let mvpe_state = Cpu::mvpe_disable();

        Self {
            int_state,
            mvpe_state,
        }
    }

    /// Run `f` inside a critical region
    #[inline]
    pub fn run<R>(f: impl FnOnce() -> R) -> R {
        let _region = Self::enter();
        f()
    }
}

impl Drop for CriticalRegion {
    #[inline]
    fn drop(&mut self) {
        Cpu::mvpe_restore(self.mvpe_state);
        Cpu::int_global_restore(self.int_state);
    }
}
