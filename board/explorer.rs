//! Explorer board
//!
//! Interrupt line numbers, the interrupt configuration table and the
//! error source map of the Explorer memory-controller hub.

use crate::config::{
    BspConfig, DDR4_PHY_BASE, GIC_BASE, GPBC_PERI_BASE, GPBC_SPI_BASE, GPBC_SYS_BASE,
    NUM_INTERRUPTS, NUM_VPES, OPSW_BASE, SERDES_BASE, TOP_BASE,
};
use crate::drivers::MmioRegisters;
use crate::fatal::{
    self, Doorbell, ErepType, Erep, ErrorBlock, ErrorSource, HaltPolicy, Severity, StatusBank,
};
use crate::irq::{Cic, IntConfig, IrqNumber, Trigger};
use crate::{Error, Result};

/// Explorer interrupt line numbers
pub mod lines {
    use crate::irq::IrqNumber;

    pub const FOXHOUND_LANE_0: IrqNumber = 0;
    pub const FOXHOUND_LANE_1: IrqNumber = 1;
    pub const FOXHOUND_LANE_2: IrqNumber = 2;
    pub const FOXHOUND_LANE_3: IrqNumber = 3;
    pub const FOXHOUND_LANE_4: IrqNumber = 4;
    pub const FOXHOUND_LANE_5: IrqNumber = 5;
    pub const FOXHOUND_LANE_6: IrqNumber = 6;
    pub const FOXHOUND_LANE_7: IrqNumber = 7;
    pub const FOXHOUND_NON_FATAL: IrqNumber = 8;
    pub const FOXHOUND_FATAL: IrqNumber = 9;
    pub const DDR4_PHY: IrqNumber = 10;
    pub const DDR4_PHY_NON_FATAL: IrqNumber = 11;
    pub const DDR4_PHY_FATAL: IrqNumber = 12;
    pub const TOP_DIGITAL_IO: IrqNumber = 13;
    pub const OCMB_IP_0: IrqNumber = 14;
    pub const OCMB_IP_1: IrqNumber = 15;
    pub const OCMB_IP_2: IrqNumber = 16;
    pub const OCMB_IP_3: IrqNumber = 17;
    pub const OCMB_IP_4: IrqNumber = 18;
    pub const OCMB_IP_5: IrqNumber = 19;
    pub const OCMB_IP_6: IrqNumber = 20;
    pub const OCMB_IP_7: IrqNumber = 21;
    pub const TWI_0_M: IrqNumber = 22;
    pub const TWI_0_S: IrqNumber = 23;
    pub const TWI_1_M: IrqNumber = 24;
    pub const TWI_1_S: IrqNumber = 25;
    pub const GPIO_0: IrqNumber = 26;
    pub const GPIO_1: IrqNumber = 27;
    pub const GPIO_2: IrqNumber = 28;
    pub const GPIO_3: IrqNumber = 29;
    pub const UART_0: IrqNumber = 30;
    pub const SPI_0: IrqNumber = 31;
    pub const WDT: IrqNumber = 32;
    pub const GPBC_FATAL_ERROR: IrqNumber = 33;
    pub const GPBC_NON_FATAL_ERROR: IrqNumber = 34;
    pub const GPBC_DEBUG: IrqNumber = 35;
    pub const SYS_DCSU: IrqNumber = 36;
    pub const TOP_FATAL: IrqNumber = 37;
    pub const TOP_NON_FATAL: IrqNumber = 38;
    pub const FAIL_N: IrqNumber = 39;
    pub const EFUSE_IRQ: IrqNumber = 40;
    pub const EFUSE_ECC_SINGLE_ERR: IrqNumber = 41;
    pub const EFUSE_ECC_DOUBLE_ERR: IrqNumber = 42;
    pub const SPCS_TS_IRQ: IrqNumber = 43;
    pub const SPCS_VM_IRQ: IrqNumber = 44;
    pub const SPCS_PD_IRQ: IrqNumber = 45;
    pub const SAVE_N: IrqNumber = 46;
    pub const PCSE_IRQ_0: IrqNumber = 47;
    pub const PCSE_IRQ_1: IrqNumber = 48;
    pub const MIPS_DOORBELL_XCBI: IrqNumber = 49;
    pub const OCMB_IP_8: IrqNumber = 50;
    pub const OCMB_IP_9: IrqNumber = 51;
    pub const OCMB_IP_10: IrqNumber = 52;
    pub const OCMB_IP_11: IrqNumber = 53;
    pub const OPSW_CR_I: IrqNumber = 54;
    pub const OPSW_CR_I1: IrqNumber = 55;
    pub const TIMER_0: IrqNumber = 56;
    pub const TIMER_1: IrqNumber = 57;
    pub const TIMER_2: IrqNumber = 58;
    pub const TIMER_3: IrqNumber = 59;
    pub const RESERVED_0: IrqNumber = 60;
    pub const RESERVED_1: IrqNumber = 61;
    pub const RESERVED_2: IrqNumber = 62;
    pub const RESERVED_3: IrqNumber = 63;
}

/// Lines latched on a rising edge; all others are level sensitive
pub const EDGE_LINES: [IrqNumber; 16] = [
    lines::FOXHOUND_NON_FATAL,
    lines::FOXHOUND_FATAL,
    lines::DDR4_PHY_NON_FATAL,
    lines::DDR4_PHY_FATAL,
    lines::GPBC_FATAL_ERROR,
    lines::GPBC_NON_FATAL_ERROR,
    lines::TOP_FATAL,
    lines::TOP_NON_FATAL,
    lines::PCSE_IRQ_0,
    lines::PCSE_IRQ_1,
    lines::OPSW_CR_I,
    lines::OPSW_CR_I1,
    lines::TIMER_0,
    lines::TIMER_1,
    lines::TIMER_2,
    lines::TIMER_3,
];

/// Priority of every wired line
const LINE_PRIORITY: u8 = 1;

const fn build_int_config() -> [IntConfig; NUM_INTERRUPTS] {
    let mut table = [IntConfig::vpe_pin(0, LINE_PRIORITY, Trigger::Level); NUM_INTERRUPTS];

    let mut i = 0;
    while i < EDGE_LINES.len() {
        table[EDGE_LINES[i] as usize].trigger = Trigger::Edge;
        i += 1;
    }

    // Unwired lines
    let mut line = lines::RESERVED_0 as usize;
    while line <= lines::RESERVED_3 as usize {
        table[line].priority = 0;
        line += 1;
    }

    table
}

/// Interrupt configuration table, indexed by line
///
/// Every line is routed to the interrupt pin of VPE 0.
pub static INT_CONFIG: [IntConfig; NUM_INTERRUPTS] = build_int_config();

/// The Explorer interrupt controller type
pub type ExplorerCic = Cic<MmioRegisters, NUM_INTERRUPTS>;

/// The interrupt controller
pub static CIC: ExplorerCic = Cic::new(unsafe { MmioRegisters::new(GIC_BASE) });

/// The EREP encoder
pub static EREP: Erep<MmioRegisters> = Erep::new(unsafe { MmioRegisters::new(OPSW_BASE) });

static SERDES_REGS: MmioRegisters = unsafe { MmioRegisters::new(SERDES_BASE) };
static DDR4_PHY_REGS: MmioRegisters = unsafe { MmioRegisters::new(DDR4_PHY_BASE) };
static GPBC_SYS_REGS: MmioRegisters = unsafe { MmioRegisters::new(GPBC_SYS_BASE) };
static GPBC_PERI_REGS: MmioRegisters = unsafe { MmioRegisters::new(GPBC_PERI_BASE) };
static GPBC_SPI_REGS: MmioRegisters = unsafe { MmioRegisters::new(GPBC_SPI_BASE) };
static TOP_REGS: MmioRegisters = unsafe { MmioRegisters::new(TOP_BASE) };

static HALT: HaltPolicy = HaltPolicy;

static FOXHOUND_BLOCKS: [ErrorBlock; 1] = [ErrorBlock {
    name: "foxhound",
    regs: &SERDES_REGS,
    erep_type: ErepType::Foxhound,
    banks: &[StatusBank::new("csu_fatal", 0x0140, 0x0144, 1)],
}];

static DDR4_PHY_BLOCKS: [ErrorBlock; 1] = [ErrorBlock {
    name: "ddr4_phy",
    regs: &DDR4_PHY_REGS,
    erep_type: ErepType::Ddr4Phy,
    banks: &[StatusBank::new("phy_fatal", 0x0400, 0x0404, 1)],
}];

static DDR4_PHY_NF_BLOCKS: [ErrorBlock; 1] = [ErrorBlock {
    name: "ddr4_phy",
    regs: &DDR4_PHY_REGS,
    erep_type: ErepType::Ddr4PhyNf,
    banks: &[StatusBank::new("phy_non_fatal", 0x0410, 0x0414, 1)],
}];

static GPBC_BLOCKS: [ErrorBlock; 3] = [
    ErrorBlock {
        name: "gpbc_sys",
        regs: &GPBC_SYS_REGS,
        erep_type: ErepType::GpbcSys,
        banks: &[
            StatusBank::new("slv_ic0_di", 0x3C, 0xBC, 2),
            StatusBank::new("chk_ic0_di", 0x4C, 0xCC, 5),
        ],
    },
    ErrorBlock {
        name: "gpbc_peri",
        regs: &GPBC_PERI_REGS,
        erep_type: ErepType::GpbcPeri,
        banks: &[StatusBank::new("di_intr", 0x3C, 0xBC, 4)],
    },
    ErrorBlock {
        name: "gpbc_spi",
        regs: &GPBC_SPI_REGS,
        erep_type: ErepType::GpbcSpi,
        banks: &[StatusBank::new("spi_fatal", 0x0040, 0x0044, 1)],
    },
];

static TOP_BLOCKS: [ErrorBlock; 1] = [ErrorBlock {
    name: "top",
    regs: &TOP_REGS,
    erep_type: ErepType::Top,
    banks: &[StatusBank::new("top_fatal", 0x0200, 0x0210, 2)],
}];

static TOP_NF_BLOCKS: [ErrorBlock; 1] = [ErrorBlock {
    name: "top",
    regs: &TOP_REGS,
    erep_type: ErepType::TopNf,
    banks: &[StatusBank::new("top_non_fatal", 0x0220, 0x0224, 1)],
}];

/// Error sources armed by `fatal_init`
pub static ERROR_SOURCES: [ErrorSource<MmioRegisters>; 12] = [
    ErrorSource::new(
        "foxhound_fatal",
        lines::FOXHOUND_FATAL,
        Severity::Fatal,
        Doorbell::FATAL,
        &FOXHOUND_BLOCKS,
        &EREP,
        &HALT,
    ),
    ErrorSource::new(
        "ddr4_phy_fatal",
        lines::DDR4_PHY_FATAL,
        Severity::Fatal,
        Doorbell::FATAL,
        &DDR4_PHY_BLOCKS,
        &EREP,
        &HALT,
    ),
    ErrorSource::new(
        "ddr4_phy_non_fatal",
        lines::DDR4_PHY_NON_FATAL,
        Severity::NonFatal,
        Doorbell::CALIBRATION,
        &DDR4_PHY_NF_BLOCKS,
        &EREP,
        &HALT,
    ),
    ErrorSource::new(
        "gpbc_fatal",
        lines::GPBC_FATAL_ERROR,
        Severity::Fatal,
        Doorbell::FATAL,
        &GPBC_BLOCKS,
        &EREP,
        &HALT,
    ),
    ErrorSource::new(
        "top_fatal",
        lines::TOP_FATAL,
        Severity::Fatal,
        Doorbell::FATAL,
        &TOP_BLOCKS,
        &EREP,
        &HALT,
    ),
    ErrorSource::new(
        "top_non_fatal",
        lines::TOP_NON_FATAL,
        Severity::NonFatal,
        Doorbell::FATAL,
        &TOP_NF_BLOCKS,
        &EREP,
        &HALT,
    ),
    ErrorSource::new(
        "wdt",
        lines::WDT,
        Severity::Watchdog,
        Doorbell::FATAL,
        &[],
        &EREP,
        &HALT,
    ),
    // No status registers behind these lines
    ErrorSource::signal("fail_n", lines::FAIL_N, ErepType::Top, &EREP, &HALT),
    ErrorSource::signal("pcse_irq_0", lines::PCSE_IRQ_0, ErepType::Top, &EREP, &HALT),
    ErrorSource::signal("opsw_cr_i", lines::OPSW_CR_I, ErepType::Top, &EREP, &HALT),
    ErrorSource::signal("opsw_cr_i1", lines::OPSW_CR_I1, ErepType::Top, &EREP, &HALT),
    // VPE1 interval timer
    ErrorSource::signal("timer_2", lines::TIMER_2, ErepType::IntervalWdt, &EREP, &HALT),
];

/// Check a platform configuration against the board's controller and
/// EREP block
pub fn check_config(config: &BspConfig) -> Result<()> {
    config.validate()?;

    if config.num_interrupts != CIC.num_lines()
        || config.num_vpes != NUM_VPES
        || config.gic_base != CIC.gic().regs().base_address()
        || config.opsw_base != EREP.regs().base_address()
    {
        log::error!("board: configuration does not match Explorer: {:?}", config);
        return Err(Error::InvalidConfig);
    }
    Ok(())
}

/// Load the configuration table and claim the controller for the boot VPE
pub fn gic_init(config: &BspConfig) -> Result<()> {
    check_config(config)?;
    CIC.init(&INT_CONFIG, &[])?;
    CIC.set_core(config.boot_vpe)?;
    Ok(())
}

/// Clear the EREP slot and arm every error source
pub fn fatal_init() -> Result<()> {
    EREP.init();
    fatal::register_sources(&CIC, &ERROR_SOURCES)
}

/// Error source armed on `line`, if any
pub fn error_source(line: IrqNumber) -> Option<&'static ErrorSource<MmioRegisters>> {
    ERROR_SOURCES.iter().find(|source| source.line() == line)
}
