//! Explorer BSP - board support for the Explorer memory-controller hub
//!
//! This library provides the interrupt and error-reporting core of the
//! Explorer firmware: the Central Interrupt Controller (CIC) configuration
//! and dispatch layer, the fatal/non-fatal hardware error handlers it feeds,
//! and the EREP encoder that hands error descriptors to the host through
//! scratchpad registers and doorbell bits.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(all(explorer_hw, not(test)), feature(asm_experimental_arch))]

// Core modules
pub mod utils;
pub mod config;

// CPU control
pub mod arch;

// Synchronization primitives
pub mod sync;

// Register access
pub mod drivers;

// Interrupt controller and dispatch
pub mod irq;

// Fatal error handling and host reporting
pub mod fatal;

// Simulated register files
pub mod emulator;

// Explorer board data and bring-up
pub mod board;

pub use irq::{Cic, IrqNumber};
pub use config::BspConfig;
pub use fatal::erep::{Erep, ErrorReport};

/// BSP version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bring up the interrupt controller and the fatal error path on Explorer
///
/// Must run once on the boot VPE, before interrupts are globally enabled.
pub fn init() -> Result<()> {
    init_with(&BspConfig::default())
}

/// Bring up Explorer with an explicit platform configuration
///
/// Fails with `InvalidConfig` when `config` does not describe this board.
pub fn init_with(config: &BspConfig) -> Result<()> {
    board::explorer::gic_init(config)?;
    board::explorer::fatal_init()?;
    log::set_max_level(config.log_level);

    log::info!("Explorer BSP v{} initialized", VERSION);

    Ok(())
}

/// Common error type for the BSP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Interrupt line outside the controller's range
    InvalidIrq,
    /// VPE id outside the controller's range
    InvalidVpe,
    /// Malformed configuration table or platform configuration
    InvalidConfig,
    /// Controller used before `init`
    NotInitialized,
    /// Controller or logger initialized twice
    AlreadyInitialized,
    /// Line enabled without a registered callback
    NoHandler,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::InvalidIrq => "invalid interrupt line",
            Error::InvalidVpe => "invalid VPE id",
            Error::InvalidConfig => "invalid configuration",
            Error::NotInitialized => "interrupt controller not initialized",
            Error::AlreadyInitialized => "already initialized",
            Error::NoHandler => "no callback registered",
        };
        f.write_str(msg)
    }
}

/// Result type alias
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(all(explorer_hw, target_os = "none", not(test)))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("firmware panic: {}", info);

    <arch::Cpu as arch::CpuControl>::halt()
}
