//! Architecture support
//!
//! The BSP only needs a handful of CPU controls from the architecture: the
//! global interrupt enable, multi-VPE execution control, the current VPE
//! number and a way to park the core. They are grouped in [`CpuControl`] and
//! the implementation for the build target is exported as [`Cpu`].

cfg_if::cfg_if! {
    if #[cfg(all(explorer_hw, not(test)))] {
        mod mips;
        pub use mips::Mips as Cpu;
    } else {
        pub mod host;
        pub use host::HostCpu as Cpu;
    }
}

/// CPU controls used by the critical region and the fatal escalation path
///
/// State values returned by the `*_disable` functions are opaque and must be
/// handed back unchanged to the matching `*_restore` function.
pub trait CpuControl {
    /// Disable interrupts on the current VPE, returning the previous state
    fn int_global_disable() -> u32;

    /// Restore the interrupt enable state saved by `int_global_disable`
    fn int_global_restore(state: u32);

    /// Stop the other VPEs of the core, returning the previous MVPE state
    fn mvpe_disable() -> u32;

    /// Restore the MVPE state saved by `mvpe_disable`
    fn mvpe_restore(state: u32);

    /// Number of the VPE executing this code
    fn current_vpe() -> u32;

    /// Park the current VPE forever
    fn halt() -> !;
}
