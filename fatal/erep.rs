//! EREP - error reporting to the host
//!
//! An error descriptor is packed into the four OPSW scratchpad registers
//! and announced by setting a bit in the outbound doorbell register. There
//! is one descriptor slot: a new descriptor overwrites whatever the host
//! has not read yet.
//!
//! Scratchpad layout:
//!
//! | register | bits   | field                                   |
//! |----------|--------|-----------------------------------------|
//! | SPAD0    | 31..24 | error type                              |
//! | SPAD0    | 23..0  | sub-category (`0x00FFFFFF` = don't care) |
//! | SPAD1    | 31..0  | register offset (`0xFFFFFFFF` = don't care) |
//! | SPAD2    | 31..0  | raw error data                          |
//! | SPAD3    | 0      | descriptor filled                       |
//! | SPAD3    | 1      | multiple errors found                   |
//!
//! The descriptor is written and the doorbell rung inside a critical
//! region, so the host never observes a torn descriptor.

use core::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

use crate::drivers::RegisterFile;
use crate::sync::CriticalRegion;

/// OPSW register offsets
pub mod opsw_regs {
    /// OUTBOUND_DOORBELL - Doorbell bits towards the host
    pub const OUTBOUND_DOORBELL: u32 = 0x0040;
    /// SCRATCHPAD_0 - Error type and sub-category
    pub const SCRATCHPAD_0: u32 = 0x0080;
    /// SCRATCHPAD_1 - Register offset
    pub const SCRATCHPAD_1: u32 = 0x0084;
    /// SCRATCHPAD_2 - Error data
    pub const SCRATCHPAD_2: u32 = 0x0088;
    /// SCRATCHPAD_3 - Descriptor flags
    pub const SCRATCHPAD_3: u32 = 0x008C;

    /// Scratchpads in register order
    pub const SCRATCHPADS: [u32; 4] = [SCRATCHPAD_0, SCRATCHPAD_1, SCRATCHPAD_2, SCRATCHPAD_3];
}

/// Sub-category value meaning "not applicable"
pub const SUB_CATEGORY_DONT_CARE: u32 = 0x00FF_FFFF;

/// Register offset value meaning "not applicable"
pub const REG_OFFSET_DONT_CARE: u32 = 0xFFFF_FFFF;

const TYPE_SHIFT: u32 = 24;

/// Error type reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErepType {
    /// Foxhound serdes fatal
    Foxhound = 0x1,
    /// DDR4 PHY fatal
    Ddr4Phy = 0x2,
    /// DDR4 PHY non-fatal
    Ddr4PhyNf = 0x3,
    /// GPBC system fatal
    GpbcSys = 0x4,
    /// GPBC peripheral fatal
    GpbcPeri = 0x5,
    /// GPBC SPI fatal
    GpbcSpi = 0x6,
    /// TOP fatal
    Top = 0x7,
    /// TOP non-fatal
    TopNf = 0x8,
    /// Firmware assertion
    FwAssert = 0x9,
    /// CPU exception
    CpuExc = 0xA,
    /// VPE0 hardware watchdog expiry
    HardwareWdt = 0xB,
    /// VPE1 interval watchdog expiry
    IntervalWdt = 0xC,
}

impl ErepType {
    /// Decode a raw type value
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0x1 => ErepType::Foxhound,
            0x2 => ErepType::Ddr4Phy,
            0x3 => ErepType::Ddr4PhyNf,
            0x4 => ErepType::GpbcSys,
            0x5 => ErepType::GpbcPeri,
            0x6 => ErepType::GpbcSpi,
            0x7 => ErepType::Top,
            0x8 => ErepType::TopNf,
            0x9 => ErepType::FwAssert,
            0xA => ErepType::CpuExc,
            0xB => ErepType::HardwareWdt,
            0xC => ErepType::IntervalWdt,
            _ => return None,
        })
    }
}

bitflags! {
    /// Outbound doorbell bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Doorbell: u32 {
        /// Doorbell 1 - fatal errors
        const FATAL = 1 << 1;
        /// Doorbell 2 - assertions and exceptions
        const ASSERT = 1 << 2;
        /// Doorbell 3 - continuous calibration errors
        const CALIBRATION = 1 << 3;
    }
}

bitflags! {
    /// Descriptor flags held in SCRATCHPAD_3
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReportFlags: u32 {
        /// Descriptor holds information
        const FILLED = 1 << 0;
        /// More than one error condition was found
        const MULTIPLE = 1 << 1;
    }
}

/// Error report descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    /// Descriptor holds information
    pub filled: bool,
    /// Error type
    pub err_type: ErepType,
    /// More than one error condition was found
    pub multiple_found: bool,
    /// Sub-category, 24 bits
    pub sub_category: u32,
    /// Offset of the register the error was found in
    pub reg_offset: u32,
    /// Raw error data
    pub err_data: u32,
}

impl ErrorReport {
    /// Create a filled descriptor
    pub const fn new(err_type: ErepType, sub_category: u32, reg_offset: u32, err_data: u32) -> Self {
        Self {
            filled: true,
            err_type,
            multiple_found: false,
            sub_category: sub_category & SUB_CATEGORY_DONT_CARE,
            reg_offset,
            err_data,
        }
    }

    /// Set the multiple-found flag
    pub const fn with_multiple(mut self, multiple_found: bool) -> Self {
        self.multiple_found = multiple_found;
        self
    }

    /// Pack into scratchpad values, SCRATCHPAD_0 first
    pub fn pack(&self) -> [u32; 4] {
        let mut flags = ReportFlags::empty();
        flags.set(ReportFlags::FILLED, self.filled);
        flags.set(ReportFlags::MULTIPLE, self.multiple_found);

        [
            ((self.err_type as u32) << TYPE_SHIFT) | (self.sub_category & SUB_CATEGORY_DONT_CARE),
            self.reg_offset,
            self.err_data,
            flags.bits(),
        ]
    }

    /// Unpack scratchpad values
    ///
    /// Returns `None` if the type field holds no known error type.
    pub fn unpack(spads: [u32; 4]) -> Option<Self> {
        let err_type = ErepType::from_raw((spads[0] >> TYPE_SHIFT) as u8)?;
        let flags = ReportFlags::from_bits_truncate(spads[3]);

        Some(Self {
            filled: flags.contains(ReportFlags::FILLED),
            err_type,
            multiple_found: flags.contains(ReportFlags::MULTIPLE),
            sub_category: spads[0] & SUB_CATEGORY_DONT_CARE,
            reg_offset: spads[1],
            err_data: spads[2],
        })
    }
}

/// Pre-packed hardware watchdog descriptor
const WDT_HEADER: [u32; 4] = [
    ((ErepType::HardwareWdt as u32) << TYPE_SHIFT) | SUB_CATEGORY_DONT_CARE,
    REG_OFFSET_DONT_CARE,
    0,
    ReportFlags::FILLED.bits(),
];

/// EREP encoder over the OPSW register block
pub struct Erep<R: RegisterFile> {
    regs: R,
    reports: AtomicU32,
}

impl<R: RegisterFile> Erep<R> {
    /// Create an encoder over an OPSW register file
    pub const fn new(regs: R) -> Self {
        Self {
            regs,
            reports: AtomicU32::new(0),
        }
    }

    /// Get the underlying register file
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Clear the descriptor slot and the EREP doorbell bits
    pub fn init(&self) {
        let _region = CriticalRegion::enter();
        for spad in opsw_regs::SCRATCHPADS {
            self.regs.write(spad, 0);
        }
        self.regs
            .modify(opsw_regs::OUTBOUND_DOORBELL, Doorbell::all().bits(), 0);
        log::debug!("EREP: descriptor slot cleared");
    }

    /// Store a descriptor in the scratchpads, replacing any earlier one
    pub fn ext_err_fill(&self, report: &ErrorReport) {
        let _region = CriticalRegion::enter();
        self.write_spads(report.pack());
    }

    /// Ring a doorbell, leaving the other doorbell bits unchanged
    pub fn db_ring(&self, doorbell: Doorbell) {
        let _region = CriticalRegion::enter();
        self.ring(doorbell);
    }

    /// Store a descriptor and ring a doorbell as one step
    pub fn report(&self, report: &ErrorReport, doorbell: Doorbell) {
        {
            let _region = CriticalRegion::enter();
            self.write_spads(report.pack());
            self.ring(doorbell);
        }
        self.reports.fetch_add(1, Ordering::Relaxed);

        log::error!(
            "EREP: {:?} sub {:#x} offset {:#x} data {:#010x}{} -> {:?}",
            report.err_type,
            report.sub_category,
            report.reg_offset,
            report.err_data,
            if report.multiple_found { " (multiple)" } else { "" },
            doorbell
        );
    }

    /// Report a hardware watchdog expiry on the fatal doorbell
    pub fn wdt_trigger(&self) {
        {
            let _region = CriticalRegion::enter();
            self.write_spads(WDT_HEADER);
            self.ring(Doorbell::FATAL);
        }
        self.reports.fetch_add(1, Ordering::Relaxed);
        log::error!("EREP: hardware watchdog expiry reported");
    }

    /// Report a firmware assertion
    pub fn fw_assert(&self, code: u32) {
        let report = ErrorReport::new(
            ErepType::FwAssert,
            SUB_CATEGORY_DONT_CARE,
            REG_OFFSET_DONT_CARE,
            code,
        );
        self.report(&report, Doorbell::ASSERT);
    }

    /// Report a CPU exception from its Cause and EPC values
    pub fn cpu_exception(&self, cause: u32, epc: u32) {
        // Cause.ExcCode
        let exc_code = (cause >> 2) & 0x1F;
        let report = ErrorReport::new(ErepType::CpuExc, exc_code, epc, cause);
        self.report(&report, Doorbell::ASSERT);
    }

    /// Read the descriptor slot as the host sees it
    pub fn read_back(&self) -> Option<ErrorReport> {
        let spads = {
            let _region = CriticalRegion::enter();
            opsw_regs::SCRATCHPADS.map(|spad| self.regs.read(spad))
        };
        ErrorReport::unpack(spads)
    }

    /// EREP doorbell bits currently set
    pub fn doorbell_status(&self) -> Doorbell {
        Doorbell::from_bits_truncate(self.regs.read(opsw_regs::OUTBOUND_DOORBELL))
    }

    /// Number of reports sent since boot
    pub fn reports_sent(&self) -> u32 {
        self.reports.load(Ordering::Relaxed)
    }

    // Flags go last so the host never sees FILLED next to stale fields
    fn write_spads(&self, spads: [u32; 4]) {
        for (offset, value) in opsw_regs::SCRATCHPADS.into_iter().zip(spads) {
            self.regs.write(offset, value);
        }
    }

    fn ring(&self, doorbell: Doorbell) {
        self.regs
            .modify(opsw_regs::OUTBOUND_DOORBELL, 0, doorbell.bits());
    }
}
