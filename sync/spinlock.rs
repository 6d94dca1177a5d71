//! Simple spinlock implementation
//!
//! Provides a basic spinlock that busy-waits until the lock is acquired.
//! Suitable for the short table updates done by the interrupt controller.
//! A plain `lock` does not mask interrupts. Data that is also touched from
//! interrupt context is taken with [`SpinLock::lock_irq_disabled`], which
//! holds a [`CriticalRegion`] for as long as the guard lives.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use super::CriticalRegion;

/// A simple spinlock
pub struct SpinLock<T> {
    /// Atomic flag indicating if the lock is held
    locked: AtomicBool,
    /// The data protected by the lock
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Create a new spinlock
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Try to acquire the lock without blocking
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Acquire the lock, spinning until it's available
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }

            while self.is_locked() {
                core::hint::spin_loop();
            }
        }
    }

    /// Acquire the lock with interrupts disabled on this VPE
    ///
    /// Interrupts are restored after the lock is released.
    pub fn lock_irq_disabled(&self) -> SpinLockIrqGuard<'_, T> {
        let region = CriticalRegion::enter();
        SpinLockIrqGuard {
            guard: self.lock(),
            _region: region,
        }
    }

    /// Check if the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// A guard that provides access to the data protected by a SpinLock
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// Guard of a lock taken with interrupts disabled
pub struct SpinLockIrqGuard<'a, T> {
    // Released before the region ends
    guard: SpinLockGuard<'a, T>,
    _region: CriticalRegion,
}

impl<'a, T> Deref for SpinLockIrqGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<'a, T> DerefMut for SpinLockIrqGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_excludes_try_lock() {
        let lock = SpinLock::new(5u32);

        let guard = lock.lock();
        assert!(lock.is_locked());
        assert!(lock.try_lock().is_none());
        drop(guard);

        assert!(!lock.is_locked());
        assert_eq!(*lock.try_lock().unwrap(), 5);
    }

    #[test]
    fn test_irq_guard_masks_interrupts() {
        use crate::arch::host::HostCpu;

        let lock = SpinLock::new(1u32);
        {
            let mut guard = lock.lock_irq_disabled();
            *guard += 1;
            assert!(lock.is_locked());
            assert!(!HostCpu::interrupts_enabled());
        }

        assert!(!lock.is_locked());
        assert!(HostCpu::interrupts_enabled());
        assert_eq!(*lock.lock(), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let lock = std::sync::Arc::new(SpinLock::new(0u32));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        *lock.lock() += 1;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*lock.lock(), 4000);
    }
}
