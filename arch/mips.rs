//! MIPS interAptiv (MIPS32r2 + MT ASE) CPU controls

use core::arch::asm;

use super::CpuControl;

/// Status.IE
const STATUS_IE: u32 = 1 << 0;
/// MVPControl.EVP
const MVPCONTROL_EVP: u32 = 1 << 0;
/// EBase.CPUNum
const EBASE_CPUNUM_MASK: u32 = 0x3FF;

/// MIPS implementation of [`CpuControl`]
pub struct Mips;

impl CpuControl for Mips {
    #[inline]
    fn int_global_disable() -> u32 {
        let status: u32;
        unsafe {
            asm!("di {0}", "ehb", out(reg) status, options(nostack));
        }
        status & STATUS_IE
    }

    #[inline]
    fn int_global_restore(state: u32) {
        if state & STATUS_IE != 0 {
            unsafe {
                asm!("ei", "ehb", options(nostack));
            }
        }
    }

    #[inline]
    fn mvpe_disable() -> u32 {
        let mvpcontrol: u32;
        unsafe {
            asm!(
                ".set push",
                ".set mt",
                "dvpe {0}",
                "ehb",
                ".set pop",
                out(reg) mvpcontrol,
                options(nostack)
            );
        }
        mvpcontrol & MVPCONTROL_EVP
    }

    #[inline]
    fn mvpe_restore(state: u32) {
        if state & MVPCONTROL_EVP != 0 {
            unsafe {
                asm!(".set push", ".set mt", "evpe", "ehb", ".set pop", options(nostack));
            }
        }
    }

    #[inline]
    fn current_vpe() -> u32 {
        let ebase: u32;
        unsafe {
            asm!("mfc0 {0}, $15, 1", out(reg) ebase, options(nomem, nostack));
        }
        ebase & EBASE_CPUNUM_MASK
    }

    fn halt() -> ! {
        loop {
            unsafe {
                asm!("wait", options(nomem, nostack));
            }
        }
    }
}
