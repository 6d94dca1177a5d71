//! Synchronization primitives
//!
//! This module provides the synchronization primitives used by the
//! interrupt controller and the error-reporting path.

pub mod spinlock;
pub mod critical;

// Re-export for convenience
pub use spinlock::{SpinLock, SpinLockGuard, SpinLockIrqGuard};
pub use critical::CriticalRegion;
