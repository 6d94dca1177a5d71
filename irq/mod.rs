//! Interrupt handling module
//!
//! This module provides the Central Interrupt Controller (CIC) layer of the
//! BSP: the interrupt line and configuration-table types, the callback
//! registry, the low-level GIC register layer and the [`Cic`] itself, which
//! loads the configuration table, exposes per-line operations and
//! dispatches fired lines to their callbacks.

pub mod chip;
pub mod gic;
pub mod handler;

// Re-export commonly used types
pub use chip::{Cic, IrqStats};
pub use gic::Gic;
pub use handler::{Callback, CallbackArg, CallbackEntry, CallbackFn, CallbackTable, InterruptHandler};

/// Interrupt line number
pub type IrqNumber = u32;

/// VPE (hardware thread) number
pub type VpeId = u32;

/// Number of VPEs the interrupt controller can route to
pub const MAX_VPES: usize = 6;

/// Highest priority a line can be configured with
pub const MAX_PRIORITY: u8 = 63;

/// Interrupt destination type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DestType {
    /// Interrupt pin of a VPE
    VpePin = 0,
    /// Non-maskable interrupt of a VPE
    VpeNmi = 1,
    /// Yield qualifier of the core
    CoreYq = 2,
}

/// Trigger type of an interrupt line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Trigger {
    /// Level sensitive
    Level = 0,
    /// Edge sensitive
    Edge = 1,
}

/// Per-VPE local interrupt sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LocalInt {
    /// Watchdog timer
    Watchdog = 0,
    /// Count/compare
    Compare = 1,
    /// CPU timer
    Timer = 2,
    /// Performance counter overflow
    PerfCount = 3,
    /// Software interrupt 0
    SwInt0 = 4,
    /// Software interrupt 1
    SwInt1 = 5,
    /// Fast debug channel
    FastDebug = 6,
}

impl LocalInt {
    /// Number of local interrupt sources per VPE
    pub const COUNT: usize = 7;

    /// All local interrupt sources, in bit order
    pub const ALL: [LocalInt; Self::COUNT] = [
        LocalInt::Watchdog,
        LocalInt::Compare,
        LocalInt::Timer,
        LocalInt::PerfCount,
        LocalInt::SwInt0,
        LocalInt::SwInt1,
        LocalInt::FastDebug,
    ];

    /// Bit of this source in the local pending/mask registers
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }

    /// Index of this source
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Configuration of one global interrupt line
///
/// The line number is implied by the entry's position in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntConfig {
    /// Destination type
    pub dest_type: DestType,
    /// Destination VPE or core
    pub dest_id: VpeId,
    /// Priority (pin number for `VpePin` destinations)
    pub priority: u8,
    /// Trigger type
    pub trigger: Trigger,
}

impl IntConfig {
    /// Create a new line configuration
    pub const fn new(dest_type: DestType, dest_id: VpeId, priority: u8, trigger: Trigger) -> Self {
        Self {
            dest_type,
            dest_id,
            priority,
            trigger,
        }
    }

    /// Route the line to a VPE interrupt pin
    pub const fn vpe_pin(dest_id: VpeId, priority: u8, trigger: Trigger) -> Self {
        Self::new(DestType::VpePin, dest_id, priority, trigger)
    }

    /// Check the entry against the controller limits
    pub fn validate(&self) -> crate::Result<()> {
        if self.dest_id as usize >= MAX_VPES {
            return Err(crate::Error::InvalidVpe);
        }
        if self.priority > MAX_PRIORITY {
            return Err(crate::Error::InvalidConfig);
        }
        Ok(())
    }
}

/// Configuration of one local interrupt source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIntConfig {
    /// Local source
    pub int_id: LocalInt,
    /// Destination type
    pub dest_type: DestType,
    /// Destination VPE
    pub dest_id: VpeId,
    /// Priority (pin number for `VpePin` destinations)
    pub priority: u8,
}

impl LocalIntConfig {
    /// Create a new local source configuration
    pub const fn new(int_id: LocalInt, dest_type: DestType, dest_id: VpeId, priority: u8) -> Self {
        Self {
            int_id,
            dest_type,
            dest_id,
            priority,
        }
    }

    /// Check the entry against the controller limits
    pub fn validate(&self) -> crate::Result<()> {
        if self.dest_id as usize >= MAX_VPES {
            return Err(crate::Error::InvalidVpe);
        }
        if self.dest_type == DestType::CoreYq || self.priority > MAX_PRIORITY {
            return Err(crate::Error::InvalidConfig);
        }
        Ok(())
    }
}
