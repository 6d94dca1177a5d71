//! Host CPU model
//!
//! Used for unit tests and for builds on anything that is not the Explorer
//! MIPS core. Interrupts are only ever delivered by explicit dispatch calls,
//! so "disable interrupts" is modelled as taking ownership of a single
//! global interrupt domain: another context trying to enter spins until the
//! owner restores. The owner disabling again sees interrupts already off,
//! as `di` would, so critical regions nest.

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use super::CpuControl;

/// Context owning the interrupt domain, 0 when interrupts are on
static INT_OWNER: AtomicUsize = AtomicUsize::new(0);
/// Number of MVPE disables currently in effect
static MVPE_DISABLED: AtomicU32 = AtomicU32::new(0);
/// VPE reported by `current_vpe`
static CURRENT_VPE: AtomicU32 = AtomicU32::new(0);

/// Identity of the executing context, never 0
#[cfg(test)]
fn context_id() -> usize {
    std::thread_local!(static CONTEXT: u8 = const { 0 });
    CONTEXT.with(|context| context as *const u8 as usize)
}

/// Identity of the executing context, never 0
#[cfg(not(test))]
fn context_id() -> usize {
    1
}

/// Host implementation of [`CpuControl`]
pub struct HostCpu;

impl HostCpu {
    /// Select the VPE number reported by `current_vpe`
    pub fn set_current_vpe(vpe: u32) {
        CURRENT_VPE.store(vpe, Ordering::Relaxed);
    }

    /// Whether interrupts are enabled for the calling context
    pub fn interrupts_enabled() -> bool {
        INT_OWNER.load(Ordering::Acquire) != context_id()
    }

    /// Whether the other VPEs are currently stopped in the host model
    pub fn mvpe_disabled() -> bool {
        MVPE_DISABLED.load(Ordering::Acquire) != 0
    }
}

impl CpuControl for HostCpu {
    fn int_global_disable() -> u32 {
        let me = context_id();
        if INT_OWNER.load(Ordering::Acquire) == me {
            return 0;
        }
        while INT_OWNER
            .compare_exchange_weak(0, me, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        1
    }

    fn int_global_restore(state: u32) {
        if state != 0 {
            INT_OWNER.store(0, Ordering::Release);
        }
    }

    fn mvpe_disable() -> u32 {
        MVPE_DISABLED.fetch_add(1, Ordering::AcqRel);
        1
    }

    fn mvpe_restore(state: u32) {
        if state != 0 {
            MVPE_DISABLED.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn current_vpe() -> u32 {
        CURRENT_VPE.load(Ordering::Relaxed)
    }

    fn halt() -> ! {
        panic!("VPE {} halted", CURRENT_VPE.load(Ordering::Relaxed));
    }
}
