//! Register access
//!
//! Every driver in the BSP reaches hardware through a [`RegisterFile`]: a
//! block of 32-bit registers addressed by byte offset from the block base.
//! On the chip the register file is [`MmioRegisters`]; in unit tests it is
//! one of the simulated files from [`crate::emulator`].

pub mod mmio;

pub use mmio::{MmioRegisters, RegisterFile};
