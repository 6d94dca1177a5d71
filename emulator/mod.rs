//! Simulated register files
//!
//! The interrupt controller, the EREP scratchpads and the error status
//! blocks are all reached through [`RegisterFile`]. The emulators here give
//! those drivers hardware-like register behavior on a host, so the CIC
//! and the fatal path can be exercised without silicon.

use crate::drivers::RegisterFile;

pub mod bank;
pub mod gic;

pub use bank::RegisterBank;
pub use gic::GicEmulator;

/// Common interface of the register file emulators
pub trait Emulator: RegisterFile {
    /// Get emulator name
    fn name(&self) -> &str;

    /// Return every register to its reset value
    fn reset(&self);
}
