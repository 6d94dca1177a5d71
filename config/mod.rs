//! Platform configuration
//!
//! Address map and controller dimensions of the Explorer platform, plus
//! the build information recorded by the build script. All register block
//! addresses are uncached KSEG1 addresses.

use crate::{Error, Result};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Start of the uncached kernel segment
pub const KSEG1_BASE: usize = 0xA000_0000;

/// Uncached address of a physical offset
pub const fn kseg1(offset: usize) -> usize {
    KSEG1_BASE | offset
}

/// GIC register block
pub const GIC_BASE: usize = kseg1(0x0302_0000);
/// OPSW block holding the EREP scratchpads and doorbell
pub const OPSW_BASE: usize = kseg1(0x0300_0000);
/// GPBC peripheral block
pub const GPBC_PERI_BASE: usize = kseg1(0x0000_0000);
/// TOP block
pub const TOP_BASE: usize = kseg1(0x0000_2000);
/// GPBC system block
pub const GPBC_SYS_BASE: usize = kseg1(0x0000_4000);
/// GPBC SPI controller
pub const GPBC_SPI_BASE: usize = kseg1(0x0001_6000);
/// Foxhound serdes
pub const SERDES_BASE: usize = kseg1(0x0020_0000);
/// DDR4 PHY
pub const DDR4_PHY_BASE: usize = kseg1(0x0400_0000);

/// Global interrupt lines wired on Explorer
pub const NUM_INTERRUPTS: usize = 64;

/// Global interrupt lines the CIC hardware supports
pub const CIC_MAX_INTERRUPTS: usize = 256;

/// VPEs on the Explorer core
pub const NUM_VPES: usize = 6;

/// VPE that brings up the interrupt controller
pub const BOOT_VPE: u32 = 0;

/// Platform configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BspConfig {
    /// GIC base address
    pub gic_base: usize,
    /// OPSW base address
    pub opsw_base: usize,
    /// Number of global interrupt lines
    pub num_interrupts: usize,
    /// Number of VPEs
    pub num_vpes: usize,
    /// Boot VPE
    pub boot_vpe: u32,
    /// Maximum log level
    pub log_level: log::LevelFilter,
}

impl Default for BspConfig {
    fn default() -> Self {
        Self {
            gic_base: GIC_BASE,
            opsw_base: OPSW_BASE,
            num_interrupts: NUM_INTERRUPTS,
            num_vpes: NUM_VPES,
            boot_vpe: BOOT_VPE,
            log_level: default_log_level(),
        }
    }
}

impl BspConfig {
    /// Check the configuration against the controller limits
    pub fn validate(&self) -> Result<()> {
        if self.num_interrupts == 0
            || self.num_interrupts % 32 != 0
            || self.num_interrupts > CIC_MAX_INTERRUPTS
        {
            return Err(Error::InvalidConfig);
        }
        if self.num_vpes == 0 || self.num_vpes > crate::irq::MAX_VPES {
            return Err(Error::InvalidConfig);
        }
        if self.boot_vpe as usize >= self.num_vpes {
            return Err(Error::InvalidVpe);
        }
        if self.gic_base & 0x3 != 0 || self.opsw_base & 0x3 != 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

/// Log level selected by the `verbose` and `debug` features
pub const fn default_log_level() -> log::LevelFilter {
    if VERBOSE {
        log::LevelFilter::Trace
    } else if DEBUG {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}
